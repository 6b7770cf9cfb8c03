//! Circuit partitioning into node-scoped subcircuits.
//!
//! Logical qubits are laid out in contiguous blocks, ascending logical index
//! onto ascending node id. Gates whose operands stay on one node become local
//! operations; every cross-node two-qubit gate becomes a single
//! communication operation shared by the two subcircuits it touches.
//! Operations on the same qubit wire are chained by dependency edges, which
//! form a DAG checked with `petgraph`.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use qnet_core::{NodeId, ProtocolKind, QubitRef};
use qnet_ir::{Circuit, Gate, GateKind, QubitId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::error::{CompileError, CompileResult};
use crate::layout::QubitMapping;

/// Which protocol carries a cross-node gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationPolicy {
    /// Always use a remote gate.
    TeleGate,
    /// Always teleport the state.
    TeleData,
    /// Teleport for SWAP, remote gate otherwise.
    #[default]
    Auto,
}

impl CommunicationPolicy {
    /// Protocol for a gate under this policy.
    pub fn protocol_for(&self, gate: &GateKind) -> ProtocolKind {
        match self {
            CommunicationPolicy::TeleGate => ProtocolKind::TeleGate,
            CommunicationPolicy::TeleData => ProtocolKind::TeleData,
            CommunicationPolicy::Auto => match gate {
                GateKind::Swap => ProtocolKind::TeleData,
                _ => ProtocolKind::TeleGate,
            },
        }
    }
}

/// Partitioner settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Protocol choice for cross-node gates.
    #[serde(default)]
    pub policy: CommunicationPolicy,
}

/// Index of an operation within a [`PartitionPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanOpId(pub usize);

impl fmt::Display for PlanOpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op{}", self.0)
    }
}

/// What a planned operation does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlannedOpKind {
    /// Gate executed on a single node.
    Local {
        /// The gate.
        gate: GateKind,
    },
    /// Cross-node communication standing in for a gate.
    Communication {
        /// Carrying protocol.
        protocol: ProtocolKind,
        /// The gate being realised.
        gate: GateKind,
    },
}

/// One operation of a partition plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedOperation {
    /// Plan-local id.
    pub id: PlanOpId,
    /// What it does.
    pub kind: PlannedOpKind,
    /// Physical operands. Communication operations list source then target.
    pub qubits: Vec<QubitRef>,
    /// Logical operands, parallel to `qubits`.
    pub logical: Vec<QubitId>,
    /// Index of the originating gate in the circuit.
    pub gate_index: usize,
    /// Operations that must complete first.
    pub predecessors: Vec<PlanOpId>,
}

impl PlannedOperation {
    /// Whether this operation carries cross-node communication.
    pub fn is_communication(&self) -> bool {
        matches!(self.kind, PlannedOpKind::Communication { .. })
    }

    /// The gate this operation realises.
    pub fn gate(&self) -> &GateKind {
        match &self.kind {
            PlannedOpKind::Local { gate } | PlannedOpKind::Communication { gate, .. } => gate,
        }
    }
}

/// Which side of a communication operation a subcircuit holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommEndpoint {
    /// The sending (or control) side.
    Source,
    /// The receiving (or target) side.
    Target,
}

/// An entry of a subcircuit, in program order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubcircuitEntry {
    /// A local gate.
    Local(PlanOpId),
    /// One end of a communication operation.
    Communication {
        /// The shared operation.
        op: PlanOpId,
        /// Which end this subcircuit holds.
        endpoint: CommEndpoint,
    },
}

/// The part of a circuit that runs on one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcircuit {
    /// Node it runs on.
    pub node: NodeId,
    /// Logical qubits placed here with their slots.
    pub qubits: Vec<(QubitId, QubitRef)>,
    /// Entries in program order.
    pub entries: Vec<SubcircuitEntry>,
}

impl Subcircuit {
    /// Number of local gates.
    pub fn local_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, SubcircuitEntry::Local(_)))
            .count()
    }

    /// Communication operations this subcircuit takes part in.
    pub fn communication_ops(&self) -> Vec<PlanOpId> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                SubcircuitEntry::Communication { op, .. } => Some(*op),
                SubcircuitEntry::Local(_) => None,
            })
            .collect()
    }
}

/// Operation counts of a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionStats {
    /// Operations executed on a single node.
    pub local_operation_count: usize,
    /// Operations that exist to carry communication.
    pub cross_node_operation_count: usize,
    /// All operations.
    pub total_operation_count: usize,
    /// `cross_node_operation_count / total_operation_count`, zero when empty.
    pub communication_overhead_ratio: f64,
    /// Number of subcircuits.
    pub partitions: usize,
}

/// The result of partitioning a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionPlan {
    /// Name of the partitioned circuit.
    pub circuit_name: String,
    /// Logical to physical placement.
    pub mapping: QubitMapping,
    /// One subcircuit per used node, ascending node id.
    pub subcircuits: Vec<Subcircuit>,
    /// All operations; ids index this vector.
    pub operations: Vec<PlannedOperation>,
    /// Counts.
    pub stats: PartitionStats,
}

impl PartitionPlan {
    /// Look up an operation.
    pub fn operation(&self, id: PlanOpId) -> Option<&PlannedOperation> {
        self.operations.get(id.0)
    }

    /// Dependency graph: an edge `a -> b` means `a` precedes `b`.
    pub fn dependency_graph(&self) -> DiGraph<PlanOpId, ()> {
        let mut graph = DiGraph::with_capacity(self.operations.len(), self.operations.len());
        let indices: Vec<NodeIndex> = self
            .operations
            .iter()
            .map(|op| graph.add_node(op.id))
            .collect();
        for op in &self.operations {
            for pred in &op.predecessors {
                if let Some(&from) = indices.get(pred.0) {
                    graph.add_edge(from, indices[op.id.0], ());
                }
            }
        }
        graph
    }

    /// Operations in an order respecting every dependency edge.
    pub fn topological_order(&self) -> CompileResult<Vec<PlanOpId>> {
        let graph = self.dependency_graph();
        toposort(&graph, None)
            .map(|order| order.into_iter().map(|idx| graph[idx]).collect())
            .map_err(|cycle| CompileError::DependencyCycle(graph[cycle.node_id()].0))
    }

    /// Subcircuit for a node.
    pub fn subcircuit(&self, node: NodeId) -> Option<&Subcircuit> {
        self.subcircuits.iter().find(|s| s.node == node)
    }
}

/// Splits logical circuits across nodes.
#[derive(Debug, Clone, Default)]
pub struct Partitioner {
    config: PartitionConfig,
}

impl Partitioner {
    /// Create a partitioner.
    pub fn new(config: PartitionConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Fill nodes in ascending id order, each up to its capacity.
    pub fn partition(
        &self,
        circuit: &Circuit,
        capacities: &[(NodeId, u32)],
    ) -> CompileResult<PartitionPlan> {
        let nodes = sorted_capacities(capacities);
        check_fits(circuit, &nodes)?;

        let mut sizes = Vec::new();
        let mut remaining = circuit.num_qubits();
        for &(node, capacity) in &nodes {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(capacity);
            sizes.push((node, take));
            remaining -= take;
        }

        self.build(circuit, &sizes)
    }

    /// Split into exactly `k` contiguous blocks on the first `k` nodes.
    ///
    /// Blocks come from repeatedly halving the largest block (leftmost on
    /// ties, the left half taking the odd qubit), so the block boundaries
    /// for `k + 1` always contain those for `k`. A gate that crosses nodes
    /// at `k` therefore still crosses at `k + 1`.
    pub fn partition_into(
        &self,
        circuit: &Circuit,
        capacities: &[(NodeId, u32)],
        k: usize,
    ) -> CompileResult<PartitionPlan> {
        let nodes = sorted_capacities(capacities);
        let q = circuit.num_qubits() as usize;
        if k == 0 {
            return Err(CompileError::InvalidPartition(
                "partition count must be positive".into(),
            ));
        }
        if k > q {
            return Err(CompileError::InvalidPartition(format!(
                "cannot split {q} qubits into {k} non-empty partitions"
            )));
        }
        if k > nodes.len() {
            return Err(CompileError::InvalidPartition(format!(
                "{k} partitions requested but the network has {} nodes",
                nodes.len()
            )));
        }
        check_fits(circuit, &nodes)?;

        let mut sizes = Vec::with_capacity(k);
        for (j, (&(node, capacity), size)) in nodes.iter().zip(nested_blocks(q, k)).enumerate() {
            let size = size as u32;
            if size > capacity {
                return Err(CompileError::InvalidPartition(format!(
                    "block {j} needs {size} qubits but {node} has {capacity}"
                )));
            }
            sizes.push((node, size));
        }

        self.build(circuit, &sizes)
    }

    /// Lay out blocks and rewrite the gate list.
    fn build(&self, circuit: &Circuit, sizes: &[(NodeId, u32)]) -> CompileResult<PartitionPlan> {
        circuit.validate()?;

        let mut mapping = QubitMapping::new();
        let mut subcircuits = Vec::with_capacity(sizes.len());
        for &(node, size) in sizes {
            let mut qubits = Vec::with_capacity(size as usize);
            for slot in 0..size {
                let physical = QubitRef::new(node, slot);
                let logical = QubitId(mapping.len() as u32);
                if !mapping.push(physical) {
                    return Err(CompileError::InvalidPartition(format!(
                        "{physical} assigned twice"
                    )));
                }
                qubits.push((logical, physical));
            }
            subcircuits.push(Subcircuit {
                node,
                qubits,
                entries: Vec::new(),
            });
        }

        let mut builder = PlanBuilder {
            policy: self.config.policy,
            mapping: &mapping,
            subcircuits: &mut subcircuits,
            operations: Vec::new(),
            last_on_wire: vec![None; circuit.num_qubits() as usize],
        };
        for (index, gate) in circuit.gates().iter().enumerate() {
            builder.rewrite(index, gate)?;
        }
        let operations = builder.operations;

        let cross = operations.iter().filter(|op| op.is_communication()).count();
        let total = operations.len();
        let stats = PartitionStats {
            local_operation_count: total - cross,
            cross_node_operation_count: cross,
            total_operation_count: total,
            communication_overhead_ratio: if total == 0 {
                0.0
            } else {
                cross as f64 / total as f64
            },
            partitions: subcircuits.len(),
        };

        let plan = PartitionPlan {
            circuit_name: circuit.name().to_string(),
            mapping,
            subcircuits,
            operations,
            stats,
        };
        plan.topological_order()?;

        info!(
            circuit = %plan.circuit_name,
            qubits = circuit.num_qubits(),
            partitions = stats.partitions,
            local = stats.local_operation_count,
            cross_node = stats.cross_node_operation_count,
            overhead = stats.communication_overhead_ratio,
            "Circuit partitioned"
        );
        Ok(plan)
    }
}

/// Sizes of `k` contiguous blocks over `q` qubits, each split refining the
/// previous layout. Requires `1 <= k <= q`.
fn nested_blocks(q: usize, k: usize) -> Vec<usize> {
    let mut blocks = vec![q];
    while blocks.len() < k {
        let mut widest = 0;
        for (i, &size) in blocks.iter().enumerate() {
            if size > blocks[widest] {
                widest = i;
            }
        }
        let size = blocks[widest];
        let left = size.div_ceil(2);
        blocks[widest] = left;
        blocks.insert(widest + 1, size - left);
    }
    blocks
}

fn sorted_capacities(capacities: &[(NodeId, u32)]) -> Vec<(NodeId, u32)> {
    let mut nodes = capacities.to_vec();
    nodes.sort_by_key(|(node, _)| *node);
    nodes
}

fn check_fits(circuit: &Circuit, nodes: &[(NodeId, u32)]) -> CompileResult<()> {
    let available: u32 = nodes.iter().map(|(_, c)| *c).sum();
    if circuit.num_qubits() > available {
        return Err(CompileError::CircuitTooLarge {
            required: circuit.num_qubits(),
            available,
        });
    }
    Ok(())
}

struct PlanBuilder<'a> {
    policy: CommunicationPolicy,
    mapping: &'a QubitMapping,
    subcircuits: &'a mut Vec<Subcircuit>,
    operations: Vec<PlannedOperation>,
    last_on_wire: Vec<Option<PlanOpId>>,
}

impl PlanBuilder<'_> {
    fn physical(&self, logical: QubitId) -> CompileResult<QubitRef> {
        self.mapping.get_physical(logical).ok_or_else(|| {
            CompileError::InvalidPartition(format!("{logical} was not placed on any node"))
        })
    }

    fn rewrite(&mut self, index: usize, gate: &Gate) -> CompileResult<()> {
        let refs = gate
            .qubits
            .iter()
            .map(|q| self.physical(*q))
            .collect::<CompileResult<Vec<_>>>()?;
        let home = refs[0].node;

        if refs.iter().all(|r| r.node == home) {
            let id = self.push(
                PlannedOpKind::Local {
                    gate: gate.kind.clone(),
                },
                refs,
                gate.qubits.clone(),
                index,
            );
            self.enter(home, SubcircuitEntry::Local(id));
            return Ok(());
        }

        let protocol = self.policy.protocol_for(&gate.kind);
        if gate.arity() == 2 {
            self.communicate(protocol, gate, index, 0, 1, &refs);
            return Ok(());
        }

        // Wider gates: bring every remote operand in, then run the local
        // remainder at the first operand's node.
        for j in 1..refs.len() {
            if refs[j].node != home {
                self.communicate(protocol, gate, index, 0, j, &refs);
            }
        }
        let (local_refs, local_logical): (Vec<QubitRef>, Vec<QubitId>) = refs
            .iter()
            .zip(&gate.qubits)
            .filter(|(r, _)| r.node == home)
            .map(|(r, l)| (*r, *l))
            .unzip();
        let id = self.push(
            PlannedOpKind::Local {
                gate: gate.kind.clone(),
            },
            local_refs,
            local_logical,
            index,
        );
        self.enter(home, SubcircuitEntry::Local(id));
        Ok(())
    }

    fn communicate(
        &mut self,
        protocol: ProtocolKind,
        gate: &Gate,
        index: usize,
        source: usize,
        target: usize,
        refs: &[QubitRef],
    ) {
        let (src, dst) = (refs[source], refs[target]);
        let id = self.push(
            PlannedOpKind::Communication {
                protocol,
                gate: gate.kind.clone(),
            },
            vec![src, dst],
            vec![gate.qubits[source], gate.qubits[target]],
            index,
        );
        debug!(op = %id, %protocol, %src, %dst, gate = %gate.kind, "Cross-node gate rewritten");
        self.enter(
            src.node,
            SubcircuitEntry::Communication {
                op: id,
                endpoint: CommEndpoint::Source,
            },
        );
        self.enter(
            dst.node,
            SubcircuitEntry::Communication {
                op: id,
                endpoint: CommEndpoint::Target,
            },
        );
    }

    fn push(
        &mut self,
        kind: PlannedOpKind,
        qubits: Vec<QubitRef>,
        logical: Vec<QubitId>,
        gate_index: usize,
    ) -> PlanOpId {
        let id = PlanOpId(self.operations.len());
        let mut predecessors: Vec<PlanOpId> = logical
            .iter()
            .filter_map(|q| self.last_on_wire.get(q.0 as usize).copied().flatten())
            .collect();
        predecessors.sort();
        predecessors.dedup();
        for q in &logical {
            if let Some(slot) = self.last_on_wire.get_mut(q.0 as usize) {
                *slot = Some(id);
            }
        }
        self.operations.push(PlannedOperation {
            id,
            kind,
            qubits,
            logical,
            gate_index,
            predecessors,
        });
        id
    }

    fn enter(&mut self, node: NodeId, entry: SubcircuitEntry) {
        if let Some(sub) = self.subcircuits.iter_mut().find(|s| s.node == node) {
            sub.entries.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(n: u32, each: u32) -> Vec<(NodeId, u32)> {
        (0..n).map(|i| (NodeId(i), each)).collect()
    }

    #[test]
    fn test_single_boundary_gate() {
        // 4 qubits, one CX across the boundary of two blocks.
        let mut circuit = Circuit::new("boundary", 4);
        circuit.h(QubitId(0)).unwrap();
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        circuit.cx(QubitId(2), QubitId(3)).unwrap();
        circuit.cx(QubitId(1), QubitId(2)).unwrap();

        let plan = Partitioner::default()
            .partition_into(&circuit, &caps(2, 2), 2)
            .unwrap();

        assert_eq!(plan.stats.cross_node_operation_count, 1);
        assert_eq!(plan.stats.local_operation_count, 3);
        assert!((plan.stats.communication_overhead_ratio - 1.0 / 4.0).abs() < 1e-12);

        let comm = plan.operations.iter().find(|op| op.is_communication()).unwrap();
        assert_eq!(comm.qubits, vec![QubitRef::new(0, 1), QubitRef::new(1, 0)]);
        // Both subcircuits see the one communication operation.
        assert_eq!(plan.subcircuits[0].communication_ops(), vec![comm.id]);
        assert_eq!(plan.subcircuits[1].communication_ops(), vec![comm.id]);
        // It waits on the last gates of both wires.
        assert_eq!(comm.predecessors, vec![PlanOpId(1), PlanOpId(2)]);
    }

    #[test]
    fn test_greedy_fill() {
        let circuit = Circuit::ghz(4).unwrap();
        let plan = Partitioner::default()
            .partition(&circuit, &[(NodeId(1), 3), (NodeId(0), 3)])
            .unwrap();
        assert_eq!(plan.mapping.get_physical(QubitId(2)), Some(QubitRef::new(0, 2)));
        assert_eq!(plan.mapping.get_physical(QubitId(3)), Some(QubitRef::new(1, 0)));
        assert_eq!(plan.stats.partitions, 2);
        assert_eq!(plan.stats.cross_node_operation_count, 1);
    }

    #[test]
    fn test_nested_blocks() {
        let circuit = Circuit::new("seven", 7);
        let plan = Partitioner::default()
            .partition_into(&circuit, &caps(3, 4), 3)
            .unwrap();
        let sizes: Vec<usize> = plan.subcircuits.iter().map(|s| s.qubits.len()).collect();
        assert_eq!(sizes, vec![2, 2, 3]);

        assert_eq!(nested_blocks(6, 1), vec![6]);
        assert_eq!(nested_blocks(6, 2), vec![3, 3]);
        assert_eq!(nested_blocks(6, 3), vec![2, 1, 3]);
        assert_eq!(nested_blocks(6, 4), vec![2, 1, 2, 1]);
        assert_eq!(nested_blocks(5, 5), vec![1; 5]);
    }

    #[test]
    fn test_rejections() {
        let circuit = Circuit::new("four", 4);
        let p = Partitioner::default();
        assert!(matches!(
            p.partition(&circuit, &caps(1, 3)),
            Err(CompileError::CircuitTooLarge {
                required: 4,
                available: 3
            })
        ));
        assert!(matches!(
            p.partition_into(&circuit, &caps(2, 4), 0),
            Err(CompileError::InvalidPartition(_))
        ));
        assert!(matches!(
            p.partition_into(&circuit, &caps(8, 4), 5),
            Err(CompileError::InvalidPartition(_))
        ));
        assert!(matches!(
            p.partition_into(&circuit, &caps(2, 4), 3),
            Err(CompileError::InvalidPartition(_))
        ));
        // 4 qubits into 2 blocks of 2 on nodes of 1 qubit each: too small.
        assert!(matches!(
            p.partition_into(&circuit, &[(NodeId(0), 1), (NodeId(1), 1), (NodeId(2), 2)], 2),
            Err(CompileError::InvalidPartition(_))
        ));
    }

    #[test]
    fn test_policy() {
        let mut circuit = Circuit::new("swap", 2);
        circuit.swap(QubitId(0), QubitId(1)).unwrap();
        circuit.cz(QubitId(0), QubitId(1)).unwrap();

        let auto = Partitioner::default()
            .partition_into(&circuit, &caps(2, 1), 2)
            .unwrap();
        let protocols: Vec<_> = auto
            .operations
            .iter()
            .map(|op| match &op.kind {
                PlannedOpKind::Communication { protocol, .. } => Some(*protocol),
                PlannedOpKind::Local { .. } => None,
            })
            .collect();
        assert_eq!(
            protocols,
            vec![Some(ProtocolKind::TeleData), Some(ProtocolKind::TeleGate)]
        );

        let forced = Partitioner::new(PartitionConfig {
            policy: CommunicationPolicy::TeleData,
        })
        .partition_into(&circuit, &caps(2, 1), 2)
        .unwrap();
        assert!(forced.operations.iter().all(|op| matches!(
            op.kind,
            PlannedOpKind::Communication {
                protocol: ProtocolKind::TeleData,
                ..
            }
        )));
    }

    #[test]
    fn test_wide_gate_spanning_nodes() {
        let mut circuit = Circuit::new("toffoli", 3);
        circuit.ccx(QubitId(0), QubitId(1), QubitId(2)).unwrap();

        let plan = Partitioner::default()
            .partition_into(&circuit, &caps(3, 1), 3)
            .unwrap();
        assert_eq!(plan.stats.cross_node_operation_count, 2);
        assert_eq!(plan.stats.local_operation_count, 1);
        let local = plan.operations.last().unwrap();
        assert_eq!(local.qubits, vec![QubitRef::new(0, 0)]);
        // Chained along the control wire through both communications.
        assert_eq!(plan.operations[1].predecessors, vec![PlanOpId(0)]);
        assert_eq!(local.predecessors, vec![PlanOpId(1)]);
        assert_eq!(plan.topological_order().unwrap().last(), Some(&local.id));
    }

    #[test]
    fn test_empty_circuit() {
        let plan = Partitioner::default()
            .partition(&Circuit::new("empty", 0), &caps(2, 2))
            .unwrap();
        assert!(plan.subcircuits.is_empty());
        assert_eq!(plan.stats.communication_overhead_ratio, 0.0);
    }
}
