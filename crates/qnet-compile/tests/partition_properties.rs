//! Property-based tests for the partitioner.

use proptest::prelude::*;
use qnet_compile::{CompileError, Partitioner, SubcircuitEntry};
use qnet_core::NodeId;
use qnet_ir::{Circuit, QubitId};
use rustc_hash::FxHashSet;

/// Random circuit of 1-12 qubits with single- and two-qubit gates.
fn arb_circuit() -> impl Strategy<Value = Circuit> {
    (1_u32..=12).prop_flat_map(|n| {
        prop::collection::vec((0..n, 0..n), 0..=30).prop_map(move |pairs| {
            let mut circuit = Circuit::new("prop", n);
            for (a, b) in pairs {
                if a == b {
                    let _ = circuit.h(QubitId(a));
                } else {
                    let _ = circuit.cx(QubitId(a), QubitId(b));
                }
            }
            circuit
        })
    })
}

/// Node capacities between 1 and 6 for 1-5 nodes.
fn arb_capacities() -> impl Strategy<Value = Vec<(NodeId, u32)>> {
    prop::collection::vec(1_u32..=6, 1..=5).prop_map(|caps| {
        caps.into_iter()
            .enumerate()
            .map(|(i, c)| (NodeId(i as u32), c))
            .collect()
    })
}

/// Every pair of qubits interacts exactly once.
fn all_to_all(n: u32) -> Circuit {
    let mut circuit = Circuit::new("all_to_all", n);
    for a in 0..n {
        circuit.h(QubitId(a)).unwrap();
        for b in (a + 1)..n {
            circuit.cz(QubitId(a), QubitId(b)).unwrap();
        }
    }
    circuit
}

proptest! {
    #[test]
    fn assignment_covers_every_qubit_once(circuit in arb_circuit(), caps in arb_capacities()) {
        let total: u32 = caps.iter().map(|(_, c)| c).sum();
        match Partitioner::default().partition(&circuit, &caps) {
            Ok(plan) => {
                prop_assert!(circuit.num_qubits() <= total);
                let mut seen = FxHashSet::default();
                let mut assigned = 0;
                for sub in &plan.subcircuits {
                    let cap = caps.iter().find(|(n, _)| *n == sub.node).map(|(_, c)| *c).unwrap();
                    prop_assert!(sub.qubits.len() as u32 <= cap);
                    for (logical, physical) in &sub.qubits {
                        prop_assert!(seen.insert(*logical));
                        prop_assert_eq!(physical.node, sub.node);
                        assigned += 1;
                    }
                }
                prop_assert_eq!(assigned, circuit.num_qubits());
                prop_assert_eq!(plan.mapping.len() as u32, circuit.num_qubits());
            }
            Err(CompileError::CircuitTooLarge { required, available }) => {
                prop_assert!(required > available);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn every_gate_becomes_one_operation(circuit in arb_circuit(), caps in arb_capacities()) {
        if let Ok(plan) = Partitioner::default().partition(&circuit, &caps) {
            prop_assert_eq!(plan.stats.total_operation_count, circuit.len());
            prop_assert!(plan.topological_order().is_ok());
            for op in &plan.operations {
                prop_assert!(op.predecessors.iter().all(|p| p.0 < op.id.0));
            }
            // Each communication op is shared by exactly two subcircuits.
            for op in plan.operations.iter().filter(|op| op.is_communication()) {
                let holders = plan
                    .subcircuits
                    .iter()
                    .filter(|s| s.entries.iter().any(|e| matches!(e, SubcircuitEntry::Communication { op: id, .. } if *id == op.id)))
                    .count();
                prop_assert_eq!(holders, 2);
            }
        }
    }

    #[test]
    fn overhead_grows_with_partitions_for_all_to_all(n in 2_u32..=12) {
        let circuit = all_to_all(n);
        let caps: Vec<(NodeId, u32)> = (0..n).map(|i| (NodeId(i), n)).collect();
        let partitioner = Partitioner::default();
        let mut previous = 0.0;
        for k in 1..=n as usize {
            let plan = partitioner.partition_into(&circuit, &caps, k).unwrap();
            let ratio = plan.stats.communication_overhead_ratio;
            prop_assert!(ratio >= previous, "k={} ratio {} < {}", k, ratio, previous);
            previous = ratio;
        }
    }

    #[test]
    fn overhead_grows_with_partitions_for_ghz(n in 2_u32..=16) {
        let circuit = Circuit::ghz(n).unwrap();
        let caps: Vec<(NodeId, u32)> = (0..n).map(|i| (NodeId(i), n)).collect();
        let mut previous = 0.0;
        for k in 1..=n as usize {
            let plan = Partitioner::default().partition_into(&circuit, &caps, k).unwrap();
            prop_assert_eq!(plan.stats.cross_node_operation_count, k - 1);
            prop_assert!(plan.stats.communication_overhead_ratio >= previous);
            previous = plan.stats.communication_overhead_ratio;
        }
    }

    #[test]
    fn overhead_never_drops_as_partitions_grow(circuit in arb_circuit()) {
        let n = circuit.num_qubits();
        let caps: Vec<(NodeId, u32)> = (0..n).map(|i| (NodeId(i), n)).collect();
        let partitioner = Partitioner::default();
        let mut previous = partitioner.partition_into(&circuit, &caps, 1).unwrap();
        prop_assert_eq!(previous.stats.cross_node_operation_count, 0);
        for k in 2..=n as usize {
            let plan = partitioner.partition_into(&circuit, &caps, k).unwrap();
            prop_assert!(
                plan.stats.communication_overhead_ratio >= previous.stats.communication_overhead_ratio,
                "k={} ratio {} < {}",
                k,
                plan.stats.communication_overhead_ratio,
                previous.stats.communication_overhead_ratio
            );
            prop_assert!(
                plan.stats.cross_node_operation_count >= previous.stats.cross_node_operation_count
            );
            previous = plan;
        }
    }
}

#[test]
fn disjoint_pairs_keep_crossing_after_further_splits() {
    let mut circuit = Circuit::new("pairs", 6);
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    circuit.cx(QubitId(2), QubitId(3)).unwrap();
    circuit.cx(QubitId(4), QubitId(5)).unwrap();
    let caps: Vec<(NodeId, u32)> = (0..6).map(|i| (NodeId(i), 6)).collect();

    let ratios: Vec<f64> = (1..=6)
        .map(|k| {
            Partitioner::default()
                .partition_into(&circuit, &caps, k)
                .unwrap()
                .stats
                .communication_overhead_ratio
        })
        .collect();
    assert!(ratios.windows(2).all(|w| w[1] >= w[0]), "{ratios:?}");
    assert_eq!(ratios[0], 0.0);
    assert!((ratios[1] - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(ratios[5], 1.0);
}

#[test]
fn boundary_gate_ratio_matches_local_count() {
    let mut circuit = Circuit::new("scenario", 4);
    circuit.h(QubitId(0)).unwrap();
    circuit.h(QubitId(3)).unwrap();
    circuit.cx(QubitId(2), QubitId(3)).unwrap();
    circuit.cx(QubitId(1), QubitId(2)).unwrap();

    let plan = Partitioner::default()
        .partition_into(&circuit, &[(NodeId(0), 2), (NodeId(1), 2)], 2)
        .unwrap();
    let local = plan.stats.local_operation_count;
    assert_eq!(plan.stats.cross_node_operation_count, 1);
    assert!((plan.stats.communication_overhead_ratio - 1.0 / (local as f64 + 1.0)).abs() < 1e-12);
}

#[test]
fn qft_plan_serialises() {
    let circuit = Circuit::qft(5).unwrap();
    let caps = [(NodeId(0), 3), (NodeId(1), 3)];
    let plan = Partitioner::default().partition_into(&circuit, &caps, 2).unwrap();
    let json = serde_json::to_string(&plan).unwrap();
    let parsed: qnet_compile::PartitionPlan = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.mapping, plan.mapping);
    assert_eq!(parsed.subcircuits, plan.subcircuits);
    assert_eq!(parsed.operations.len(), plan.operations.len());
}
