//! Mapping of logical qubits onto physical node slots.

use qnet_core::{NodeId, QubitRef};
use qnet_ir::QubitId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Bijection between a circuit's logical qubits and network slots.
///
/// Logical qubits are dense (`0..n`), so the forward direction is a vector
/// indexed by logical id; the reverse direction is a hash map rebuilt on
/// deserialisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<QubitRef>", into = "Vec<QubitRef>")]
pub struct QubitMapping {
    physical: Vec<QubitRef>,
    logical: FxHashMap<QubitRef, QubitId>,
}

impl QubitMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map the next logical qubit onto `physical`.
    ///
    /// Returns `false` and leaves the mapping untouched when `physical` is
    /// already taken.
    pub fn push(&mut self, physical: QubitRef) -> bool {
        if self.logical.contains_key(&physical) {
            return false;
        }
        let logical = QubitId(self.physical.len() as u32);
        self.logical.insert(physical, logical);
        self.physical.push(physical);
        true
    }

    /// Slot holding a logical qubit.
    pub fn get_physical(&self, logical: QubitId) -> Option<QubitRef> {
        self.physical.get(logical.0 as usize).copied()
    }

    /// Logical qubit held by a slot.
    pub fn get_logical(&self, physical: QubitRef) -> Option<QubitId> {
        self.logical.get(&physical).copied()
    }

    /// Number of mapped qubits.
    pub fn len(&self) -> usize {
        self.physical.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.physical.is_empty()
    }

    /// `(logical, physical)` pairs in logical order.
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, QubitRef)> + '_ {
        self.physical
            .iter()
            .enumerate()
            .map(|(i, p)| (QubitId(i as u32), *p))
    }

    /// Logical qubits placed on `node`, ascending.
    pub fn assigned_to(&self, node: NodeId) -> Vec<QubitId> {
        self.iter()
            .filter(|(_, p)| p.node == node)
            .map(|(l, _)| l)
            .collect()
    }

    /// Nodes holding at least one qubit, ascending.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.physical.iter().map(|p| p.node).collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }
}

impl From<Vec<QubitRef>> for QubitMapping {
    fn from(physical: Vec<QubitRef>) -> Self {
        let mut mapping = Self::new();
        for p in physical {
            mapping.push(p);
        }
        mapping
    }
}

impl From<QubitMapping> for Vec<QubitRef> {
    fn from(mapping: QubitMapping) -> Self {
        mapping.physical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_lookup() {
        let mut mapping = QubitMapping::new();
        assert!(mapping.push(QubitRef::new(0, 0)));
        assert!(mapping.push(QubitRef::new(1, 0)));
        assert!(!mapping.push(QubitRef::new(0, 0)));

        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get_physical(QubitId(1)), Some(QubitRef::new(1, 0)));
        assert_eq!(mapping.get_logical(QubitRef::new(0, 0)), Some(QubitId(0)));
        assert_eq!(mapping.assigned_to(NodeId(1)), vec![QubitId(1)]);
        assert_eq!(mapping.nodes(), vec![NodeId(0), NodeId(1)]);
    }

    #[test]
    fn test_serde_rebuilds_reverse_map() {
        let mapping = QubitMapping::from(vec![QubitRef::new(0, 1), QubitRef::new(2, 0)]);
        let json = serde_json::to_string(&mapping).unwrap();
        let parsed: QubitMapping = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.get_logical(QubitRef::new(2, 0)), Some(QubitId(1)));
    }
}
