//! Property-based tests for circuit construction.

use proptest::prelude::*;
use qnet_ir::{Circuit, GateKind, IrError, QubitId};

/// Generate a circuit of 1-8 qubits with 0-20 basic gates.
fn arb_circuit() -> impl Strategy<Value = Circuit> {
    (1_u32..=8).prop_flat_map(|num_qubits| {
        prop::collection::vec((0..num_qubits, 0..num_qubits, any::<bool>()), 0..=20).prop_map(
            move |ops| {
                let mut circuit = Circuit::new("prop", num_qubits);
                for (a, b, two) in ops {
                    if two && a != b {
                        let _ = circuit.cx(QubitId(a), QubitId(b));
                    } else {
                        let _ = circuit.h(QubitId(a));
                    }
                }
                circuit
            },
        )
    })
}

proptest! {
    #[test]
    fn depth_never_exceeds_gate_count(circuit in arb_circuit()) {
        prop_assert!(circuit.depth() <= circuit.len());
        if !circuit.is_empty() {
            prop_assert!(circuit.depth() >= 1);
        }
    }

    #[test]
    fn json_form_reloads(circuit in arb_circuit()) {
        let json = circuit.to_json().unwrap();
        let parsed = Circuit::from_json(&json).unwrap();
        prop_assert_eq!(parsed.len(), circuit.len());
        prop_assert_eq!(parsed.two_qubit_count(), circuit.two_qubit_count());
    }

    #[test]
    fn qft_interacts_every_pair(n in 2_u32..=10) {
        let circuit = Circuit::qft(n).unwrap();
        let pairs = (n * (n - 1) / 2) as usize;
        prop_assert_eq!(circuit.interaction_pairs().len(), pairs);
    }
}

#[test]
fn grover_single_qubit_has_no_controlled_gates() {
    let circuit = Circuit::grover(1, &[1], 2).unwrap();
    assert_eq!(circuit.two_qubit_count(), 0);
    assert!(circuit.gates().iter().any(|g| g.kind == GateKind::Z));
}

#[test]
fn grover_two_qubits_uses_cnot() {
    let circuit = Circuit::grover(2, &[3], 1).unwrap();
    assert!(circuit.gates().iter().any(|g| g.kind == GateKind::CX));
}

#[test]
fn out_of_range_names_gate() {
    let mut circuit = Circuit::new("range", 3);
    let err = circuit.swap(QubitId(0), QubitId(7)).unwrap_err();
    match err {
        IrError::QubitOutOfRange {
            qubit, gate_name, ..
        } => {
            assert_eq!(qubit, QubitId(7));
            assert_eq!(gate_name.as_deref(), Some("swap"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
