//! Discrete-event scheduler.
//!
//! One logical clock, advanced from event to event. Each tick admits what
//! can start at the current instant and then jumps to the next scheduled
//! event. Protocols are executed at admission, which fixes their duration;
//! the outcome is applied when the completion event fires.

use std::cmp::Ordering;

use qnet_core::{
    Lease, NetError, Network, NodeId, NodeRegistry, ProtocolEngine, ProtocolRequest, QubitRef,
    SimTime,
};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{SchedError, SchedResult};
use crate::event::{EventKind, EventQueue};
use crate::graph::DependencyGraph;
use crate::ledger::{LedgerEntry, Outcome, ScheduleLedger};
use crate::operation::{
    Endpoint, Execution, FailureReason, Operation, OperationId, OperationKind, OperationRequest,
    OperationStatus, PendingResult, Priority,
};
use crate::queue::PriorityQueue;

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Entanglement attempts per communication operation.
    #[serde(default = "default_attempt_budget")]
    pub attempt_budget: u32,
    /// Priority given to requests that do not choose one.
    #[serde(default)]
    pub default_priority: Priority,
}

fn default_attempt_budget() -> u32 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            attempt_budget: default_attempt_budget(),
            default_priority: Priority::DEFAULT,
        }
    }
}

/// Concrete resources chosen for an operation.
#[derive(Debug, Clone)]
struct Placement {
    qubits: Vec<QubitRef>,
    channel: Option<(NodeId, NodeId)>,
}

/// A feasible node pair for a communication operation.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    load: f64,
    busy_slots: usize,
    nodes: (NodeId, NodeId),
    qubits: (QubitRef, QubitRef),
}

impl Candidate {
    /// Least cumulative load first, then fewer busy slots, then lower ids.
    fn cmp_preference(&self, other: &Self) -> Ordering {
        self.load
            .total_cmp(&other.load)
            .then_with(|| self.busy_slots.cmp(&other.busy_slots))
            .then_with(|| self.nodes.cmp(&other.nodes))
    }
}

/// The resource scheduler.
///
/// Sole mutator of qubit occupancy and entanglement links once a network
/// is handed to it.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    network: Network,
    engine: ProtocolEngine,
    clock: SimTime,
    operations: Vec<Operation>,
    queue: PriorityQueue,
    graph: DependencyGraph,
    events: EventQueue,
    ledger: ScheduleLedger,
    /// Normalised busy time committed by running operations, per node.
    in_flight: Vec<f64>,
}

impl Scheduler {
    /// Create a scheduler owning `network`.
    pub fn new(network: Network, engine: ProtocolEngine, config: SchedulerConfig) -> Self {
        let nodes = network.registry().len();
        Self {
            config,
            network,
            engine,
            clock: SimTime::ZERO,
            operations: Vec::new(),
            queue: PriorityQueue::new(),
            graph: DependencyGraph::new(),
            events: EventQueue::new(),
            ledger: ScheduleLedger::new(),
            in_flight: vec![0.0; nodes],
        }
    }

    /// Submit an operation.
    ///
    /// Malformed operands and failed predecessors do not produce an error:
    /// the operation is recorded as failed and its id returned. Unknown
    /// predecessors are an error and nothing is recorded.
    pub fn submit(&mut self, request: OperationRequest) -> SchedResult<OperationId> {
        let id = OperationId(self.operations.len() as u64);
        let unmet = self.graph.add_operation(id, &request.predecessors)?;
        let arrival = request.arrival;
        let validation = self.validate(&request);
        debug!(op = %id, kind = %request.kind.name(), unmet, "Operation submitted");
        self.operations.push(Operation::new(id, request, self.clock));

        if let Err(detail) = validation {
            self.fail_unrun(id, FailureReason::InvalidOperand { detail })?;
            return Ok(id);
        }
        if let Some(predecessor) = self.graph.failed_predecessor(id) {
            self.fail_unrun(id, FailureReason::UpstreamFailure { predecessor })?;
            return Ok(id);
        }

        if unmet > 0 {
            self.operations[id.index()].status = OperationStatus::Blocked;
        } else {
            self.enqueue(id);
        }
        if arrival > self.clock {
            self.events.push(arrival, EventKind::Arrival(id));
        }
        Ok(id)
    }

    /// Cancel a pending or blocked operation. Its dependents fail upstream.
    pub fn cancel(&mut self, id: OperationId) -> SchedResult<()> {
        let op = self
            .operations
            .get(id.index())
            .ok_or(SchedError::OperationNotFound(id))?;
        if !op.status.is_cancellable() {
            return Err(SchedError::InvalidOperationState {
                id,
                expected: "Pending or Blocked".to_string(),
                found: op.status.name().to_string(),
            });
        }

        self.queue.remove(id);
        self.close_unrun(id, Outcome::Cancelled);
        info!(op = %id, "Operation cancelled");
        self.propagate_failure(id)
    }

    /// Admit what can start now, then advance to the next event.
    ///
    /// Returns `false` once nothing is left to do.
    pub fn tick(&mut self) -> SchedResult<bool> {
        self.admit()?;

        let Some(next) = self.events.peek_time() else {
            let pending = self.queue.len();
            let blocked = self.blocked_count();
            if pending + blocked > 0 {
                error!(pending, blocked, now = %self.clock, "Scheduler stalled");
                return Err(SchedError::Stalled { pending, blocked });
            }
            return Ok(false);
        };

        if next > self.clock {
            self.clock = next;
        }
        while let Some((_, event)) = self.events.pop_due(self.clock) {
            self.handle(event)?;
        }
        Ok(true)
    }

    /// Tick until idle and return the ledger.
    pub fn run_until_idle(&mut self) -> SchedResult<&ScheduleLedger> {
        while self.tick()? {}

        info!(
            operations = self.operations.len(),
            completed = self.ledger.completed().count(),
            failed = self.ledger.failed().count(),
            horizon = %self.clock,
            efficiency = self.efficiency(),
            "Schedule complete"
        );
        Ok(&self.ledger)
    }

    /// Status of an operation.
    pub fn status(&self, id: OperationId) -> Option<&OperationStatus> {
        self.operations.get(id.index()).map(|op| &op.status)
    }

    /// Full record of an operation.
    pub fn operation(&self, id: OperationId) -> Option<&Operation> {
        self.operations.get(id.index())
    }

    /// All submitted operations, in submission order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The ledger.
    pub fn ledger(&self) -> &ScheduleLedger {
        &self.ledger
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.clock
    }

    /// The network being scheduled.
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Node registry of the network.
    pub fn registry(&self) -> &NodeRegistry {
        self.network.registry()
    }

    /// The protocol engine.
    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    /// Settings.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Dependency graph of submitted operations.
    pub fn dependencies(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Busy time over available node time so far, in `[0, 1]`.
    pub fn efficiency(&self) -> f64 {
        let registry = self.network.registry();
        let horizon = self.clock.as_secs();
        if horizon <= 0.0 || registry.is_empty() {
            return 0.0;
        }
        (registry.total_busy_time() / (registry.len() as f64 * horizon)).clamp(0.0, 1.0)
    }

    /// Cumulative normalised busy time per node.
    pub fn node_busy_times(&self) -> Vec<(NodeId, f64)> {
        self.network
            .registry()
            .nodes()
            .iter()
            .map(|node| (node.id(), node.busy_time()))
            .collect()
    }

    /// Operations waiting for resources.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Operations waiting for predecessors.
    pub fn blocked_count(&self) -> usize {
        self.count_status(|s| matches!(s, OperationStatus::Blocked))
    }

    /// Operations holding qubits.
    pub fn running_count(&self) -> usize {
        self.count_status(OperationStatus::is_running)
    }

    /// Check if every submitted operation is terminal.
    pub fn is_idle(&self) -> bool {
        self.operations.iter().all(|op| op.status.is_terminal())
    }

    fn count_status(&self, pred: impl Fn(&OperationStatus) -> bool) -> usize {
        self.operations.iter().filter(|op| pred(&op.status)).count()
    }

    // ------------------------------------------------------------------
    // Validation and placement
    // ------------------------------------------------------------------

    fn validate(&self, request: &OperationRequest) -> Result<(), String> {
        let registry = self.network.registry();
        for endpoint in &request.operands {
            match endpoint {
                Endpoint::Exact(qubit) => registry.validate_ref(*qubit).map_err(operand_detail)?,
                Endpoint::OnNode(node) if registry.node(*node).is_none() => {
                    return Err(format!("unknown node {node}"));
                }
                _ => {}
            }
        }

        match &request.kind {
            OperationKind::Step { gate } => {
                let arity = gate.num_qubits() as usize;
                if request.operands.is_empty() || request.operands.len() > arity {
                    return Err(format!(
                        "{gate} takes up to {arity} operands, got {}",
                        request.operands.len()
                    ));
                }
                let mut seen = FxHashSet::default();
                let mut home = None;
                for endpoint in &request.operands {
                    let Endpoint::Exact(qubit) = endpoint else {
                        return Err(format!("local {gate} needs exact qubits, got {endpoint}"));
                    };
                    if !seen.insert(*qubit) {
                        return Err(format!("{qubit} repeated in {gate}"));
                    }
                    if *home.get_or_insert(qubit.node) != qubit.node {
                        return Err(format!("local {gate} spans more than one node"));
                    }
                }
                Ok(())
            }
            kind => {
                let [source, target] = request.operands.as_slice() else {
                    return Err(format!(
                        "{} takes two operands, got {}",
                        kind.name(),
                        request.operands.len()
                    ));
                };
                // Wide gates arrive here one remote operand pair at a time.
                if let OperationKind::RemoteGate { gate } = kind {
                    if gate.num_qubits() < 2 {
                        return Err(format!("remote gate needs a multi-qubit gate, got {gate}"));
                    }
                }
                if let (Endpoint::Exact(a), Endpoint::Exact(b)) = (source, target) {
                    if a == b {
                        return Err(format!("identical operands {a}"));
                    }
                    if a.node == b.node {
                        return Err(format!("{a} and {b} are on the same node"));
                    }
                }
                let feasible = self.candidate_nodes(source).into_iter().any(|a| {
                    self.candidate_nodes(target)
                        .into_iter()
                        .any(|b| a != b && registry.connected(a, b))
                });
                if feasible {
                    Ok(())
                } else {
                    Err(format!("no connected node pair for {source} and {target}"))
                }
            }
        }
    }

    fn candidate_nodes(&self, endpoint: &Endpoint) -> Vec<NodeId> {
        match endpoint {
            Endpoint::Exact(qubit) => vec![qubit.node],
            Endpoint::OnNode(node) => vec![*node],
            Endpoint::Any => self
                .network
                .registry()
                .nodes()
                .iter()
                .map(|node| node.id())
                .collect(),
        }
    }

    fn load(&self, node: NodeId) -> f64 {
        self.network.registry().busy_time(node) + self.in_flight.get(node.index()).copied().unwrap_or(0.0)
    }

    /// Resources for `request` if they are free now, skipping `claimed`.
    fn place(&self, request: &OperationRequest, claimed: &FxHashSet<QubitRef>) -> Option<Placement> {
        let registry = self.network.registry();
        let free = |qubit: &QubitRef| registry.is_idle(*qubit) && !claimed.contains(qubit);
        let pick = |endpoint: &Endpoint, node: NodeId| -> Option<QubitRef> {
            match endpoint {
                Endpoint::Exact(qubit) => (qubit.node == node && free(qubit)).then_some(*qubit),
                Endpoint::OnNode(_) | Endpoint::Any => {
                    registry.node(node)?.idle_slots().find(|q| !claimed.contains(q))
                }
            }
        };

        if let OperationKind::Step { .. } = request.kind {
            let mut qubits = Vec::with_capacity(request.operands.len());
            for endpoint in &request.operands {
                match endpoint {
                    Endpoint::Exact(qubit) if free(qubit) => qubits.push(*qubit),
                    _ => return None,
                }
            }
            return Some(Placement {
                qubits,
                channel: None,
            });
        }

        let [source, target] = request.operands.as_slice() else {
            return None;
        };
        let mut best: Option<Candidate> = None;
        for a in self.candidate_nodes(source) {
            for b in self.candidate_nodes(target) {
                if a == b || !registry.connected(a, b) || !registry.channel_available(a, b) {
                    continue;
                }
                let (Some(qa), Some(qb)) = (pick(source, a), pick(target, b)) else {
                    continue;
                };
                let candidate = Candidate {
                    load: self.load(a) + self.load(b),
                    busy_slots: registry.busy_slots(a) + registry.busy_slots(b),
                    nodes: (a, b),
                    qubits: (qa, qb),
                };
                let better = match &best {
                    Some(current) => candidate.cmp_preference(current) == Ordering::Less,
                    None => true,
                };
                if better {
                    best = Some(candidate);
                }
            }
        }

        best.map(|c| Placement {
            qubits: vec![c.qubits.0, c.qubits.1],
            channel: Some(c.nodes),
        })
    }

    // ------------------------------------------------------------------
    // Admission and execution
    // ------------------------------------------------------------------

    fn enqueue(&mut self, id: OperationId) {
        let op = &mut self.operations[id.index()];
        op.status = OperationStatus::Pending;
        self.queue.push(id, op.request.priority, op.request.arrival);
    }

    fn admit(&mut self) -> SchedResult<()> {
        let mut claimed = FxHashSet::default();
        let mut admitted = Vec::new();
        let candidates: Vec<OperationId> = self.queue.iter().collect();

        for id in candidates {
            let request = &self.operations[id.index()].request;
            if request.arrival > self.clock {
                continue;
            }
            match self.place(request, &claimed) {
                Some(placement) => {
                    self.grant(id, placement)?;
                    admitted.push(id);
                }
                None => {
                    // Hold exact operands against lower-ranked operations.
                    claimed.extend(request.operands.iter().filter_map(|e| match e {
                        Endpoint::Exact(qubit) => Some(*qubit),
                        _ => None,
                    }));
                }
            }
        }

        for id in admitted {
            self.start(id)?;
        }
        Ok(())
    }

    fn grant(&mut self, id: OperationId, placement: Placement) -> SchedResult<()> {
        let registry = self.network.registry_mut();
        registry
            .acquire(&placement.qubits, Lease(id.0))
            .map_err(|e| defect(id, &e))?;
        if let Some((a, b)) = placement.channel {
            registry.reserve_channel(a, b).map_err(|e| defect(id, &e))?;
        }

        self.queue.remove(id);
        let op = &mut self.operations[id.index()];
        op.qubits = placement.qubits;
        op.status = OperationStatus::Admitted;
        debug!(op = %id, qubits = ?op.qubits, "Operation admitted");
        Ok(())
    }

    fn start(&mut self, id: OperationId) -> SchedResult<()> {
        let now = self.clock;
        let op = &mut self.operations[id.index()];
        op.status = OperationStatus::Running { started_at: now };
        op.started_at = Some(now);
        let qubits = op.qubits.clone();
        let kind = op.request.kind.clone();
        let budget = op.request.attempt_budget.unwrap_or(self.config.attempt_budget);

        let (duration, result, attempts) = match kind {
            OperationKind::Step { gate } => {
                match self
                    .engine
                    .execute_local(self.network.registry(), &gate, &qubits)
                {
                    Ok(local) => (
                        local.latency,
                        Ok(Execution {
                            fidelity: local.fidelity,
                            attempts: 0,
                            latency: None,
                        }),
                        0,
                    ),
                    Err(e) => (0.0, Err(FailureReason::from(&e)), 0),
                }
            }
            OperationKind::Teleport | OperationKind::RemoteGate { .. } => {
                let &[source, target] = qubits.as_slice() else {
                    return Err(SchedError::ResourceUnavailable(format!(
                        "{id} admitted with {} qubits",
                        qubits.len()
                    )));
                };
                let request = match kind {
                    OperationKind::RemoteGate { gate } => {
                        ProtocolRequest::telegate(source, target, gate)
                    }
                    _ => ProtocolRequest::teledata(source, target),
                };
                let channel = EventKind::ChannelRelease(source.node, target.node);
                match self
                    .engine
                    .execute(&mut self.network, &request, budget, now, Lease(id.0))
                {
                    Ok(outcome) => {
                        self.events.push(now + outcome.latency.entanglement, channel);
                        (
                            outcome.total_latency(),
                            Ok(Execution {
                                fidelity: outcome.fidelity,
                                attempts: outcome.attempts,
                                latency: Some(outcome.latency),
                            }),
                            outcome.attempts,
                        )
                    }
                    Err(failure) => {
                        if let NetError::ResourceUnavailable { .. } = failure.error {
                            return Err(defect(id, &failure.error));
                        }
                        self.events.push(now + failure.elapsed, channel);
                        (
                            failure.elapsed,
                            Err(FailureReason::from(&failure.error)),
                            failure.attempts,
                        )
                    }
                }
            }
        };

        for qubit in &qubits {
            let share = self.slot_share(qubit.node, duration);
            if let Some(load) = self.in_flight.get_mut(qubit.node.index()) {
                *load += share;
            }
        }

        let op = &mut self.operations[id.index()];
        op.attempts = attempts;
        op.pending = Some(PendingResult { duration, result });
        self.events.push(now + duration, EventKind::Completion(id));
        debug!(op = %id, duration, "Operation running");
        Ok(())
    }

    fn slot_share(&self, node: NodeId, seconds: f64) -> f64 {
        let capacity = self
            .network
            .registry()
            .node(node)
            .map_or(1, |n| n.capacity().max(1));
        seconds / f64::from(capacity)
    }

    // ------------------------------------------------------------------
    // Events and termination
    // ------------------------------------------------------------------

    fn handle(&mut self, event: EventKind) -> SchedResult<()> {
        match event {
            EventKind::Completion(id) => self.complete(id),
            EventKind::ChannelRelease(a, b) => {
                self.network.registry_mut().release_channel(a, b);
                Ok(())
            }
            EventKind::Arrival(id) => {
                debug!(op = %id, now = %self.clock, "Operation arrived");
                Ok(())
            }
        }
    }

    fn complete(&mut self, id: OperationId) -> SchedResult<()> {
        let now = self.clock;
        let op = &mut self.operations[id.index()];
        let Some(pending) = op.pending.take() else {
            return Err(SchedError::InvalidOperationState {
                id,
                expected: "Running".to_string(),
                found: op.status.name().to_string(),
            });
        };
        op.finished_at = Some(now);
        let qubits = op.qubits.clone();

        self.network
            .registry_mut()
            .release(&qubits, Lease(id.0))
            .map_err(|e| defect(id, &e))?;
        for qubit in &qubits {
            let share = self.slot_share(qubit.node, pending.duration);
            if let Some(load) = self.in_flight.get_mut(qubit.node.index()) {
                *load = (*load - share).max(0.0);
            }
            self.network
                .registry_mut()
                .record_busy(qubit.node, pending.duration);
        }

        match pending.result {
            Ok(execution) => {
                let op = &mut self.operations[id.index()];
                op.status = OperationStatus::Completed;
                op.execution = Some(execution);
                debug!(op = %id, fidelity = execution.fidelity, now = %now, "Operation completed");
                self.record(id, Outcome::Completed);
                for ready in self.graph.mark_completed(id)? {
                    if self.operations[ready.index()].status == OperationStatus::Blocked {
                        self.enqueue(ready);
                    }
                }
                Ok(())
            }
            Err(reason) => {
                warn!(op = %id, %reason, now = %now, "Operation failed");
                self.operations[id.index()].status = OperationStatus::Failed {
                    reason: reason.clone(),
                };
                self.record(id, Outcome::Failed { reason });
                self.propagate_failure(id)
            }
        }
    }

    /// Fail an operation that never held resources.
    fn fail_unrun(&mut self, id: OperationId, reason: FailureReason) -> SchedResult<()> {
        warn!(op = %id, %reason, "Operation rejected");
        self.close_unrun(id, Outcome::Failed { reason });
        self.propagate_failure(id)
    }

    fn close_unrun(&mut self, id: OperationId, outcome: Outcome) {
        let op = &mut self.operations[id.index()];
        op.status = match &outcome {
            Outcome::Failed { reason } => OperationStatus::Failed {
                reason: reason.clone(),
            },
            Outcome::Cancelled => OperationStatus::Cancelled,
            Outcome::Completed => OperationStatus::Completed,
        };
        op.finished_at = Some(self.clock);
        self.record(id, outcome);
    }

    /// Fail every transitive dependent of `failed` that has not finished.
    fn propagate_failure(&mut self, failed: OperationId) -> SchedResult<()> {
        let mut stack = vec![failed];
        while let Some(source) = stack.pop() {
            for dependent in self.graph.mark_failed(source)? {
                if self.operations[dependent.index()].status.is_terminal() {
                    continue;
                }
                self.queue.remove(dependent);
                warn!(op = %dependent, upstream = %source, "Upstream failure");
                self.close_unrun(
                    dependent,
                    Outcome::Failed {
                        reason: FailureReason::UpstreamFailure {
                            predecessor: source,
                        },
                    },
                );
                stack.push(dependent);
            }
        }
        Ok(())
    }

    fn record(&mut self, id: OperationId, outcome: Outcome) {
        let op = &self.operations[id.index()];
        let end_time = op.finished_at.unwrap_or(self.clock);
        self.ledger.record(LedgerEntry {
            operation_id: id,
            label: op.request.label.clone(),
            kind: op.request.kind.name(),
            communication: op.request.kind.is_communication(),
            start_time: op.started_at.unwrap_or(end_time),
            end_time,
            fidelity: op.fidelity(),
            outcome,
            qubits: op.qubits.clone(),
            attempts: op.attempts,
        });
    }
}

fn operand_detail(err: NetError) -> String {
    match err {
        NetError::InvalidOperand(detail) => detail,
        other => other.to_string(),
    }
}

fn defect(id: OperationId, err: &NetError) -> SchedError {
    error!(op = %id, %err, "Resource invariant violated");
    SchedError::ResourceUnavailable(format!("{id}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnet_core::{GaussianLinkModel, NoiseParams, ProtocolConfig};
    use qnet_ir::GateKind;
    use std::sync::Arc;

    fn scheduler(nodes: u32, qubits: u32, noise: NoiseParams, seed: u64) -> Scheduler {
        let registry = NodeRegistry::from_uniform(nodes, qubits, noise).unwrap();
        let network = Network::new(registry, Arc::new(GaussianLinkModel::default()), Some(seed));
        Scheduler::new(
            network,
            ProtocolEngine::new(ProtocolConfig::default()),
            SchedulerConfig::default(),
        )
    }

    fn quiet(nodes: u32, qubits: u32) -> Scheduler {
        scheduler(nodes, qubits, NoiseParams::noiseless(0.15), 7)
    }

    #[test]
    fn test_single_teleport() {
        let mut sched = quiet(2, 3);
        let id = sched
            .submit(OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0)))
            .unwrap();
        let ledger = sched.run_until_idle().unwrap();

        let entry = ledger.get(id).unwrap();
        assert_eq!(entry.outcome, Outcome::Completed);
        assert!(entry.fidelity.unwrap() >= 0.95);
        assert_eq!(entry.start_time, SimTime::ZERO);
        assert!((entry.end_time.as_secs() - 0.32).abs() < 1e-9);
        assert_eq!(sched.status(id), Some(&OperationStatus::Completed));
        assert!(sched.registry().is_idle(QubitRef::new(0, 0)));
        assert!(sched.is_idle());
    }

    #[test]
    fn test_invalid_operands_fail_immediately() {
        let mut sched = quiet(2, 2);
        let same = sched
            .submit(OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(0, 0)))
            .unwrap();
        let local = sched
            .submit(OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(0, 1)))
            .unwrap();
        let missing = sched
            .submit(OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(5, 0)))
            .unwrap();

        for id in [same, local, missing] {
            assert!(matches!(
                sched.status(id),
                Some(OperationStatus::Failed {
                    reason: FailureReason::InvalidOperand { .. }
                })
            ));
        }
        assert_eq!(sched.ledger().len(), 3);
        assert!(!sched.tick().unwrap());
    }

    #[test]
    fn test_unknown_predecessor_is_error() {
        let mut sched = quiet(2, 2);
        let err = sched
            .submit(
                OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0))
                    .after(OperationId(9)),
            )
            .unwrap_err();
        assert!(matches!(err, SchedError::InvalidDependency(OperationId(9))));
        assert!(sched.operations().is_empty());
    }

    #[test]
    fn test_priority_wins_contended_qubit() {
        let mut sched = quiet(2, 1);
        let low = sched
            .submit(
                OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0))
                    .with_priority(Priority::LOW),
            )
            .unwrap();
        let high = sched
            .submit(
                OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0))
                    .with_priority(Priority::HIGH),
            )
            .unwrap();
        sched.run_until_idle().unwrap();

        let low_start = sched.operation(low).unwrap().started_at.unwrap();
        let high_start = sched.operation(high).unwrap().started_at.unwrap();
        assert!(high_start < low_start);
    }

    #[test]
    fn test_fifo_within_priority() {
        let mut sched = quiet(2, 1);
        let ids: Vec<_> = (0..4)
            .map(|_| {
                sched
                    .submit(OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0)))
                    .unwrap()
            })
            .collect();
        sched.run_until_idle().unwrap();

        let starts: Vec<_> = ids
            .iter()
            .map(|id| sched.operation(*id).unwrap().started_at.unwrap())
            .collect();
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_blocked_until_predecessor_completes() {
        let mut sched = quiet(2, 2);
        let first = sched
            .submit(OperationRequest::step(GateKind::H, vec![QubitRef::new(0, 0)]))
            .unwrap();
        let second = sched
            .submit(
                OperationRequest::remote_gate(GateKind::CX, QubitRef::new(0, 0), QubitRef::new(1, 0))
                    .after(first),
            )
            .unwrap();
        assert_eq!(sched.status(second), Some(&OperationStatus::Blocked));

        sched.run_until_idle().unwrap();
        let a = sched.operation(first).unwrap();
        let b = sched.operation(second).unwrap();
        assert_eq!(b.status, OperationStatus::Completed);
        assert!(b.started_at.unwrap() >= a.finished_at.unwrap());
        assert!(!sched.ledger().get(first).unwrap().communication);
        assert!(sched.ledger().get(second).unwrap().communication);
    }

    #[test]
    fn test_cancel_rules() {
        let mut sched = quiet(2, 1);
        let first = sched
            .submit(OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0)))
            .unwrap();
        let second = sched
            .submit(OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0)).after(first))
            .unwrap();
        let third = sched
            .submit(OperationRequest::step(GateKind::X, vec![QubitRef::new(1, 0)]).after(second))
            .unwrap();

        // First tick starts `first`; it can no longer be cancelled.
        sched.tick().unwrap();
        let err = sched.cancel(first).unwrap_err();
        assert!(matches!(err, SchedError::InvalidOperationState { .. }));

        sched.cancel(second).unwrap();
        assert_eq!(sched.status(second), Some(&OperationStatus::Cancelled));
        assert_eq!(
            sched.status(third),
            Some(&OperationStatus::Failed {
                reason: FailureReason::UpstreamFailure { predecessor: second }
            })
        );
        assert!(matches!(
            sched.cancel(OperationId(42)),
            Err(SchedError::OperationNotFound(_))
        ));

        sched.run_until_idle().unwrap();
        assert_eq!(sched.status(first), Some(&OperationStatus::Completed));
        assert_eq!(sched.ledger().len(), 3);
    }

    #[test]
    fn test_any_endpoints_spread_load() {
        let mut sched = quiet(3, 2);
        for _ in 0..3 {
            sched
                .submit(OperationRequest::teleport(Endpoint::Any, Endpoint::Any))
                .unwrap();
        }
        sched.tick().unwrap();
        assert_eq!(sched.running_count(), 3);
        for node in sched.registry().nodes() {
            assert_eq!(node.busy_slots(), 2);
        }
    }

    #[test]
    fn test_future_arrival_waits() {
        let mut sched = quiet(2, 1);
        let id = sched
            .submit(
                OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0))
                    .with_arrival(SimTime::new(1.5)),
            )
            .unwrap();
        sched.run_until_idle().unwrap();
        assert_eq!(sched.operation(id).unwrap().started_at, Some(SimTime::new(1.5)));
    }

    #[test]
    fn test_efficiency_bounds() {
        let mut sched = quiet(2, 2);
        assert_eq!(sched.efficiency(), 0.0);
        sched
            .submit(OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0)))
            .unwrap();
        sched.run_until_idle().unwrap();
        // One slot of two busy on each node for the whole horizon.
        assert!((sched.efficiency() - 0.5).abs() < 1e-9);
    }
}
