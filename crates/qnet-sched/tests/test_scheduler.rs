//! End-to-end scheduler behaviour.

use std::sync::Arc;

use proptest::prelude::*;
use qnet_core::{
    GaussianLinkModel, Network, NodeId, NodeRegistry, NoiseParams, ProtocolEngine, QubitRef,
    SimTime,
};
use qnet_ir::GateKind;
use qnet_sched::{
    Endpoint, FailureReason, OperationRequest, OperationStatus, Outcome, Priority, Scheduler,
    SchedulerConfig,
};
use rustc_hash::FxHashMap;

fn scheduler(registry: NodeRegistry, seed: u64) -> Scheduler {
    let network = Network::new(registry, Arc::new(GaussianLinkModel::default()), Some(seed));
    Scheduler::new(network, ProtocolEngine::default(), SchedulerConfig::default())
}

fn uniform(nodes: u32, qubits: u32, seed: u64) -> Scheduler {
    scheduler(
        NodeRegistry::from_uniform(nodes, qubits, NoiseParams::default()).unwrap(),
        seed,
    )
}

/// Two nodes whose channel never produces a link.
fn broken_link(seed: u64) -> Scheduler {
    let mut registry = NodeRegistry::from_uniform(3, 2, NoiseParams::default()).unwrap();
    let dead = NoiseParams {
        channel_noise: 1.0,
        ..NoiseParams::default()
    };
    registry.set_link_noise(NodeId(0), NodeId(1), dead).unwrap();
    scheduler(registry, seed)
}

// ---------------------------------------------------------------------------
// Upstream failure
// ---------------------------------------------------------------------------

#[test]
fn dependent_of_failed_operation_never_runs() {
    let mut sched = broken_link(3);
    let doomed = sched
        .submit(
            OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0))
                .with_attempt_budget(4),
        )
        .unwrap();
    let child = sched
        .submit(OperationRequest::step(GateKind::H, vec![QubitRef::new(1, 0)]).after(doomed))
        .unwrap();
    let grandchild = sched
        .submit(
            OperationRequest::remote_gate(GateKind::CZ, QubitRef::new(1, 0), QubitRef::new(2, 0))
                .after(child),
        )
        .unwrap();
    let unrelated = sched
        .submit(OperationRequest::teleport(QubitRef::new(0, 1), QubitRef::new(2, 1)))
        .unwrap();

    let ledger = sched.run_until_idle().unwrap().clone();

    assert_eq!(
        sched.status(doomed),
        Some(&OperationStatus::Failed {
            reason: FailureReason::EntanglementFailure { attempts: 4 }
        })
    );
    assert_eq!(
        sched.status(child),
        Some(&OperationStatus::Failed {
            reason: FailureReason::UpstreamFailure { predecessor: doomed }
        })
    );
    assert_eq!(
        sched.status(grandchild),
        Some(&OperationStatus::Failed {
            reason: FailureReason::UpstreamFailure { predecessor: child }
        })
    );
    for id in [child, grandchild] {
        let op = sched.operation(id).unwrap();
        assert!(op.started_at.is_none());
        assert!(!ledger.get(id).unwrap().ran());
    }

    // Failure elsewhere leaves unrelated work and slot state intact.
    assert_eq!(sched.status(unrelated), Some(&OperationStatus::Completed));
    for node in sched.registry().nodes() {
        assert_eq!(node.busy_slots(), 0);
    }
}

#[test]
fn late_submission_after_failed_predecessor_fails_at_once() {
    let mut sched = broken_link(5);
    let doomed = sched
        .submit(OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0)))
        .unwrap();
    sched.run_until_idle().unwrap();

    let late = sched
        .submit(OperationRequest::step(GateKind::X, vec![QubitRef::new(0, 0)]).after(doomed))
        .unwrap();
    assert!(matches!(
        sched.status(late),
        Some(OperationStatus::Failed {
            reason: FailureReason::UpstreamFailure { .. }
        })
    ));
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[test]
fn higher_priority_admitted_before_earlier_lower_priority() {
    let mut sched = uniform(2, 1, 11);
    let blocker = sched
        .submit(OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0)))
        .unwrap();
    // Start the blocker so the other two queue behind its qubits.
    sched.tick().unwrap();
    let low = sched
        .submit(
            OperationRequest::teleport(QubitRef::new(1, 0), QubitRef::new(0, 0))
                .with_priority(Priority::LOW),
        )
        .unwrap();
    let critical = sched
        .submit(
            OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0))
                .with_priority(Priority::CRITICAL),
        )
        .unwrap();
    sched.run_until_idle().unwrap();

    let start = |id| sched.operation(id).unwrap().started_at.unwrap();
    assert!(start(blocker) < start(critical));
    assert!(start(critical) < start(low));
}

#[test]
fn ledger_records_every_terminal_operation() {
    let mut sched = uniform(3, 2, 13);
    let mut ids = Vec::new();
    for i in 0..10 {
        let request = OperationRequest::teleport(Endpoint::Any, Endpoint::Any)
            .with_label(format!("t{i}"));
        ids.push(sched.submit(request).unwrap());
    }
    let cancelled = sched
        .submit(OperationRequest::teleport(Endpoint::Any, Endpoint::Any).with_arrival(SimTime::new(50.0)))
        .unwrap();
    sched.cancel(cancelled).unwrap();

    let ledger = sched.run_until_idle().unwrap();
    assert_eq!(ledger.len(), 11);
    assert_eq!(ledger.get(cancelled).unwrap().outcome, Outcome::Cancelled);
    for id in ids {
        let entry = ledger.get(id).unwrap();
        assert!(entry.end_time >= entry.start_time);
        assert!(entry.label.as_deref().is_some_and(|l| l.starts_with('t')));
    }
    assert!(sched.is_idle());
}

// ---------------------------------------------------------------------------
// Load distribution
// ---------------------------------------------------------------------------

#[test]
fn three_small_nodes_beat_two_large_nodes_on_efficiency() {
    for seed in [1, 7, 42] {
        let run = |nodes, qubits| {
            let mut sched = uniform(nodes, qubits, seed);
            for _ in 0..24 {
                sched
                    .submit(OperationRequest::teleport(Endpoint::Any, Endpoint::Any))
                    .unwrap();
            }
            sched.run_until_idle().unwrap();
            sched.efficiency()
        };
        let three_by_two = run(3, 2);
        let two_by_three = run(2, 3);
        assert!(
            three_by_two > two_by_three,
            "seed {seed}: 3x2 {three_by_two:.3} <= 2x3 {two_by_three:.3}"
        );
    }
}

// ---------------------------------------------------------------------------
// Resource exclusivity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Job {
    Teleport { a: (u32, u32), b: (u32, u32) },
    Anywhere,
    Local { q: (u32, u32) },
}

fn arb_job(nodes: u32, qubits: u32) -> impl Strategy<Value = Job> {
    let slot = (0..nodes, 0..qubits);
    prop_oneof![
        (slot.clone(), slot.clone()).prop_map(|(a, b)| Job::Teleport { a, b }),
        Just(Job::Anywhere),
        slot.prop_map(|q| Job::Local { q }),
    ]
}

fn arb_workload() -> impl Strategy<Value = Vec<(Job, u32, u32, Option<usize>)>> {
    prop::collection::vec(
        (arb_job(3, 2), 0_u32..3, 0_u32..4, prop::option::of(0_usize..20)),
        1..25,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn no_qubit_is_held_by_two_running_operations(workload in arb_workload(), seed in 0_u64..1000) {
        let mut sched = uniform(3, 2, seed);
        let mut submitted = Vec::new();
        for (job, priority, arrival, dep) in workload {
            let mut request = match job {
                Job::Teleport { a, b } => OperationRequest::teleport(
                    QubitRef::new(a.0, a.1),
                    QubitRef::new(b.0, b.1),
                ),
                Job::Anywhere => OperationRequest::teleport(Endpoint::Any, Endpoint::Any),
                Job::Local { q } => OperationRequest::step(GateKind::H, vec![QubitRef::new(q.0, q.1)]),
            };
            request = request
                .with_priority(Priority::new(priority * 50))
                .with_arrival(SimTime::new(f64::from(arrival) * 0.1));
            if let Some(dep) = dep.and_then(|d| submitted.get(d).copied()) {
                request = request.after(dep);
            }
            submitted.push(sched.submit(request).unwrap());
        }

        let ledger = sched.run_until_idle().unwrap();
        prop_assert_eq!(ledger.len(), submitted.len());

        let mut intervals: FxHashMap<QubitRef, Vec<(f64, f64)>> = FxHashMap::default();
        for entry in ledger.iter().filter(|e| e.ran()) {
            if let Some(f) = entry.fidelity {
                prop_assert!((0.0..=1.0).contains(&f));
            }
            for qubit in &entry.qubits {
                intervals
                    .entry(*qubit)
                    .or_default()
                    .push((entry.start_time.as_secs(), entry.end_time.as_secs()));
            }
        }
        for spans in intervals.values_mut() {
            spans.sort_by(|x, y| x.0.total_cmp(&y.0));
            for pair in spans.windows(2) {
                prop_assert!(pair[0].1 <= pair[1].0 + 1e-12, "overlap {:?}", pair);
            }
        }
        prop_assert!(sched.is_idle());
    }
}
