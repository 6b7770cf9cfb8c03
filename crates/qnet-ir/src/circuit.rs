//! High-level circuit builder API.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::gate::{Gate, GateKind};
use crate::qubit::QubitId;

/// A logical quantum circuit.
///
/// Gates are kept in program order. Physical placement is decided later by
/// the partitioner, so the circuit only knows logical qubit indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    /// Name of the circuit.
    name: String,
    /// Number of logical qubits.
    num_qubits: u32,
    /// Gates in program order.
    gates: Vec<Gate>,
}

impl Circuit {
    /// Create an empty circuit over `num_qubits` logical qubits.
    pub fn new(name: impl Into<String>, num_qubits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            gates: Vec::new(),
        }
    }

    /// Parse a circuit from its JSON form and validate every gate.
    pub fn from_json(source: &str) -> IrResult<Self> {
        let circuit: Circuit = serde_json::from_str(source)?;
        circuit.validate()?;
        Ok(circuit)
    }

    /// Serialise the circuit to pretty JSON.
    pub fn to_json(&self) -> IrResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every gate's arity, duplicates and qubit range.
    pub fn validate(&self) -> IrResult<()> {
        for gate in &self.gates {
            gate.check()?;
            self.check_range(gate)?;
        }
        Ok(())
    }

    fn check_range(&self, gate: &Gate) -> IrResult<()> {
        if let Some(q) = gate.qubits.iter().find(|q| q.0 >= self.num_qubits) {
            return Err(IrError::QubitOutOfRange {
                qubit: *q,
                num_qubits: self.num_qubits,
                gate_name: Some(gate.kind.name().to_string()),
            });
        }
        Ok(())
    }

    /// Append an already-built gate.
    pub fn apply(&mut self, gate: Gate) -> IrResult<&mut Self> {
        self.check_range(&gate)?;
        self.gates.push(gate);
        Ok(self)
    }

    fn apply_kind(&mut self, kind: GateKind, qubits: Vec<QubitId>) -> IrResult<&mut Self> {
        let gate = Gate::new(kind, qubits)?;
        self.apply(gate)
    }

    // =========================================================================
    // Single-qubit gates
    // =========================================================================

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::H, vec![qubit])
    }

    /// Apply Pauli-X gate.
    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::X, vec![qubit])
    }

    /// Apply Pauli-Y gate.
    pub fn y(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::Y, vec![qubit])
    }

    /// Apply Pauli-Z gate.
    pub fn z(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::Z, vec![qubit])
    }

    /// Apply S gate.
    pub fn s(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::S, vec![qubit])
    }

    /// Apply T gate.
    pub fn t(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::T, vec![qubit])
    }

    /// Apply Rx rotation.
    pub fn rx(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::Rx(theta), vec![qubit])
    }

    /// Apply Ry rotation.
    pub fn ry(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::Ry(theta), vec![qubit])
    }

    /// Apply Rz rotation.
    pub fn rz(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::Rz(theta), vec![qubit])
    }

    /// Apply phase gate.
    pub fn p(&mut self, lambda: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::P(lambda), vec![qubit])
    }

    /// Measure a qubit.
    pub fn measure(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::Measure, vec![qubit])
    }

    /// Measure every qubit in index order.
    pub fn measure_all(&mut self) -> IrResult<&mut Self> {
        for q in 0..self.num_qubits {
            self.measure(QubitId(q))?;
        }
        Ok(self)
    }

    // =========================================================================
    // Multi-qubit gates
    // =========================================================================

    /// Apply CNOT gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::CX, vec![control, target])
    }

    /// Apply controlled-Y gate.
    pub fn cy(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::CY, vec![control, target])
    }

    /// Apply controlled-Z gate.
    pub fn cz(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::CZ, vec![control, target])
    }

    /// Apply controlled phase gate.
    pub fn cp(&mut self, lambda: f64, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::CP(lambda), vec![control, target])
    }

    /// Apply SWAP gate.
    pub fn swap(&mut self, q0: QubitId, q1: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::Swap, vec![q0, q1])
    }

    /// Apply Toffoli gate.
    pub fn ccx(&mut self, c0: QubitId, c1: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_kind(GateKind::CCX, vec![c0, c1, target])
    }

    /// Apply a multi-controlled X, picking CX/CCX for one or two controls.
    pub fn mcx(&mut self, controls: &[QubitId], target: QubitId) -> IrResult<&mut Self> {
        match controls {
            [] => self.x(target),
            [c] => self.cx(*c, target),
            [c0, c1] => self.ccx(*c0, *c1, target),
            _ => {
                let mut qubits = controls.to_vec();
                qubits.push(target);
                self.apply_kind(
                    GateKind::Mcx {
                        controls: controls.len() as u32,
                    },
                    qubits,
                )
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of logical qubits.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Gates in program order.
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Number of gates.
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    /// Whether the circuit has no gates.
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Number of gates touching exactly two qubits.
    pub fn two_qubit_count(&self) -> usize {
        self.gates.iter().filter(|g| g.arity() == 2).count()
    }

    /// Circuit depth, counting each gate as one layer on its wires.
    pub fn depth(&self) -> usize {
        let mut wire_depth = vec![0usize; self.num_qubits as usize];
        for gate in &self.gates {
            let layer = gate
                .qubits
                .iter()
                .map(|q| wire_depth[q.0 as usize])
                .max()
                .unwrap_or(0)
                + 1;
            for q in &gate.qubits {
                wire_depth[q.0 as usize] = layer;
            }
        }
        wire_depth.into_iter().max().unwrap_or(0)
    }

    /// Distinct unordered qubit pairs that share at least one gate.
    pub fn interaction_pairs(&self) -> Vec<(QubitId, QubitId)> {
        let mut seen = FxHashSet::default();
        let mut pairs = Vec::new();
        for gate in self.gates.iter().filter(|g| g.is_multi_qubit()) {
            for (i, a) in gate.qubits.iter().enumerate() {
                for b in &gate.qubits[i + 1..] {
                    let pair = if a < b { (*a, *b) } else { (*b, *a) };
                    if seen.insert(pair) {
                        pairs.push(pair);
                    }
                }
            }
        }
        pairs.sort();
        pairs
    }

    // =========================================================================
    // Algorithm library
    // =========================================================================

    /// Create a GHZ state preparation circuit.
    pub fn ghz(n: u32) -> IrResult<Self> {
        if n < 2 {
            return Err(IrError::InvalidParameters(format!(
                "GHZ needs at least 2 qubits, got {n}"
            )));
        }

        let mut circuit = Self::new("ghz", n);
        circuit.h(QubitId(0))?;
        for i in 0..n - 1 {
            circuit.cx(QubitId(i), QubitId(i + 1))?;
        }
        circuit.measure_all()?;
        Ok(circuit)
    }

    /// Create a QFT circuit (without measurements).
    pub fn qft(n: u32) -> IrResult<Self> {
        use std::f64::consts::PI;

        let mut circuit = Self::new("qft", n);

        for i in 0..n {
            circuit.h(QubitId(i))?;

            // Controlled rotations
            for j in (i + 1)..n {
                let k = j - i;
                let angle = PI / f64::from(1u32 << k.min(31));
                circuit.cp(angle, QubitId(j), QubitId(i))?;
            }
        }

        // Swap qubits for bit reversal
        for i in 0..n / 2 {
            circuit.swap(QubitId(i), QubitId(n - 1 - i))?;
        }

        Ok(circuit)
    }

    /// Create a Grover search circuit marking `marked` over `n` qubits.
    ///
    /// Qubit 0 holds the most significant bit of the marked state.
    pub fn grover(n: u32, marked: &[u64], iterations: u32) -> IrResult<Self> {
        if n == 0 || n > 63 {
            return Err(IrError::InvalidParameters(format!(
                "Grover needs between 1 and 63 qubits, got {n}"
            )));
        }
        if let Some(state) = marked.iter().find(|s| **s >= 1u64 << n) {
            return Err(IrError::InvalidParameters(format!(
                "marked state {state} does not fit in {n} qubits"
            )));
        }

        let mut circuit = Self::new("grover", n);
        let all: Vec<QubitId> = (0..n).map(QubitId).collect();
        let last = QubitId(n - 1);
        let controls = &all[..all.len() - 1];

        for q in &all {
            circuit.h(*q)?;
        }

        for _ in 0..iterations {
            for state in marked {
                let zero_bits: Vec<QubitId> = all
                    .iter()
                    .filter(|q| (state >> (n - 1 - q.0)) & 1 == 0)
                    .copied()
                    .collect();

                for q in &zero_bits {
                    circuit.x(*q)?;
                }
                if n > 1 {
                    circuit.h(last)?;
                    circuit.mcx(controls, last)?;
                    circuit.h(last)?;
                } else {
                    circuit.z(last)?;
                }
                for q in &zero_bits {
                    circuit.x(*q)?;
                }
            }

            // Diffusion operator
            for q in &all {
                circuit.h(*q)?;
                circuit.x(*q)?;
            }
            if n > 1 {
                circuit.h(last)?;
                circuit.mcx(controls, last)?;
                circuit.h(last)?;
            } else {
                circuit.z(last)?;
            }
            for q in &all {
                circuit.x(*q)?;
                circuit.h(*q)?;
            }
        }

        circuit.measure_all()?;
        Ok(circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_circuit() {
        let circuit = Circuit::new("test", 3);
        assert_eq!(circuit.name(), "test");
        assert_eq!(circuit.num_qubits(), 3);
        assert!(circuit.is_empty());
        assert_eq!(circuit.depth(), 0);
    }

    #[test]
    fn test_out_of_range() {
        let mut circuit = Circuit::new("test", 2);
        let err = circuit.cx(QubitId(0), QubitId(2)).unwrap_err();
        assert!(matches!(err, IrError::QubitOutOfRange { num_qubits: 2, .. }));
        assert!(circuit.is_empty());
    }

    #[test]
    fn test_fluent_api() {
        let mut circuit = Circuit::new("test", 2);
        circuit
            .h(QubitId(0))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap()
            .measure_all()
            .unwrap();

        assert_eq!(circuit.len(), 4);
        assert_eq!(circuit.depth(), 3); // H, CX, parallel measures
    }

    #[test]
    fn test_ghz() {
        let circuit = Circuit::ghz(5).unwrap();
        assert_eq!(circuit.num_qubits(), 5);
        assert_eq!(circuit.two_qubit_count(), 4);
        assert!(Circuit::ghz(1).is_err());
    }

    #[test]
    fn test_qft_structure() {
        let circuit = Circuit::qft(4).unwrap();
        // 4 H + 6 CP + 2 SWAP
        assert_eq!(circuit.len(), 12);
        assert_eq!(circuit.two_qubit_count(), 8);
        // Every pair interacts.
        assert_eq!(circuit.interaction_pairs().len(), 6);
    }

    #[test]
    fn test_grover_uses_multi_controlled_gate() {
        let circuit = Circuit::grover(4, &[15], 1).unwrap();
        assert!(
            circuit
                .gates()
                .iter()
                .any(|g| matches!(g.kind, GateKind::Mcx { controls: 3 }))
        );
        assert_eq!(
            circuit
                .gates()
                .iter()
                .filter(|g| g.kind == GateKind::Measure)
                .count(),
            4
        );
    }

    #[test]
    fn test_grover_rejects_oversized_mark() {
        assert!(Circuit::grover(2, &[4], 1).is_err());
        assert!(Circuit::grover(0, &[], 1).is_err());
    }

    #[test]
    fn test_json_roundtrip_validates() {
        let circuit = Circuit::ghz(3).unwrap();
        let json = circuit.to_json().unwrap();
        let parsed = Circuit::from_json(&json).unwrap();
        assert_eq!(parsed, circuit);

        let bad = r#"{"name":"bad","num_qubits":1,"gates":[{"kind":"CX","qubits":[0,1]}]}"#;
        assert!(Circuit::from_json(bad).is_err());
    }

    #[test]
    fn test_from_json_rejects_oversized_mcx() {
        let source = r#"{"name":"wide","num_qubits":2,"gates":[{"kind":{"Mcx":{"controls":4294967295}},"qubits":[0,1]}]}"#;
        let err = Circuit::from_json(source).unwrap_err();
        assert!(matches!(
            err,
            IrError::QubitCountMismatch { expected: u32::MAX, got: 2, .. }
        ));
    }
}
