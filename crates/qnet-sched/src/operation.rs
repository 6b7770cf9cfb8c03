//! Operation types for the scheduler.

use qnet_core::{LatencyBreakdown, NetError, NodeId, ProtocolKind, QubitRef, SimTime};
use qnet_ir::GateKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a submitted operation. Assigned sequentially from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub u64);

impl OperationId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Operation priority. Higher values mean higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u32);

impl Priority {
    /// Default priority (100).
    pub const DEFAULT: Priority = Priority(100);

    /// Low priority (50).
    pub const LOW: Priority = Priority(50);

    /// High priority (150).
    pub const HIGH: Priority = Priority(150);

    /// Critical priority (200).
    pub const CRITICAL: Priority = Priority(200);

    /// Create a new priority with the given value.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What an operation does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// TeleData between two qubits.
    Teleport,
    /// TeleGate applying `gate` across two nodes.
    RemoteGate {
        /// The two-qubit gate.
        gate: GateKind,
    },
    /// Local gate from a partitioned circuit.
    Step {
        /// The gate.
        gate: GateKind,
    },
}

impl OperationKind {
    /// Protocol run by this kind, if it communicates.
    pub fn protocol(&self) -> Option<ProtocolKind> {
        match self {
            OperationKind::Teleport => Some(ProtocolKind::TeleData),
            OperationKind::RemoteGate { .. } => Some(ProtocolKind::TeleGate),
            OperationKind::Step { .. } => None,
        }
    }

    /// Whether the operation carries cross-node communication.
    pub fn is_communication(&self) -> bool {
        self.protocol().is_some()
    }

    /// Short name.
    pub fn name(&self) -> String {
        match self {
            OperationKind::Teleport => "teleport".to_string(),
            OperationKind::RemoteGate { gate } => format!("remote_gate:{}", gate.name()),
            OperationKind::Step { gate } => format!("step:{}", gate.name()),
        }
    }
}

/// Where an operand may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// This exact slot.
    Exact(QubitRef),
    /// Any idle slot on this node.
    OnNode(NodeId),
    /// Any idle slot anywhere; the scheduler picks the least-loaded node.
    Any,
}

impl From<QubitRef> for Endpoint {
    fn from(qubit: QubitRef) -> Self {
        Endpoint::Exact(qubit)
    }
}

impl From<NodeId> for Endpoint {
    fn from(node: NodeId) -> Self {
        Endpoint::OnNode(node)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Exact(q) => write!(f, "{q}"),
            Endpoint::OnNode(n) => write!(f, "{n}.*"),
            Endpoint::Any => write!(f, "*"),
        }
    }
}

/// A request to schedule work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// What to do.
    pub kind: OperationKind,
    /// Operands; communication kinds take source (or control) then target.
    pub operands: Vec<Endpoint>,
    /// Admission priority.
    pub priority: Priority,
    /// Earliest simulated start.
    pub arrival: SimTime,
    /// Operations that must complete first.
    pub predecessors: Vec<OperationId>,
    /// Free-form label carried into the ledger.
    pub label: Option<String>,
    /// Entanglement attempt budget, overriding the scheduler default.
    pub attempt_budget: Option<u32>,
}

impl OperationRequest {
    fn new(kind: OperationKind, operands: Vec<Endpoint>) -> Self {
        Self {
            kind,
            operands,
            priority: Priority::DEFAULT,
            arrival: SimTime::ZERO,
            predecessors: Vec::new(),
            label: None,
            attempt_budget: None,
        }
    }

    /// Teleport the state at `source` to `target`.
    pub fn teleport(source: impl Into<Endpoint>, target: impl Into<Endpoint>) -> Self {
        Self::new(OperationKind::Teleport, vec![source.into(), target.into()])
    }

    /// Apply a two-qubit gate remotely.
    pub fn remote_gate(
        gate: GateKind,
        control: impl Into<Endpoint>,
        target: impl Into<Endpoint>,
    ) -> Self {
        Self::new(
            OperationKind::RemoteGate { gate },
            vec![control.into(), target.into()],
        )
    }

    /// Apply a gate locally on the given slots.
    pub fn step(gate: GateKind, qubits: Vec<QubitRef>) -> Self {
        Self::new(
            OperationKind::Step { gate },
            qubits.into_iter().map(Endpoint::Exact).collect(),
        )
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the arrival time.
    pub fn with_arrival(mut self, arrival: SimTime) -> Self {
        self.arrival = arrival;
        self
    }

    /// Add a predecessor.
    pub fn after(mut self, predecessor: OperationId) -> Self {
        self.predecessors.push(predecessor);
        self
    }

    /// Set all predecessors.
    pub fn with_predecessors(mut self, predecessors: Vec<OperationId>) -> Self {
        self.predecessors = predecessors;
        self
    }

    /// Set a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Override the attempt budget.
    pub fn with_attempt_budget(mut self, budget: u32) -> Self {
        self.attempt_budget = Some(budget);
        self
    }
}

/// Why an operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// Entanglement budget exhausted.
    EntanglementFailure {
        /// Attempts made.
        attempts: u32,
    },
    /// Malformed or unsupported operands.
    InvalidOperand {
        /// Details.
        detail: String,
    },
    /// A link was in the wrong state.
    InvalidLinkState {
        /// Details.
        detail: String,
    },
    /// A predecessor failed or was cancelled.
    UpstreamFailure {
        /// The predecessor.
        predecessor: OperationId,
    },
    /// A resource was unexpectedly held.
    ResourceUnavailable {
        /// Details.
        detail: String,
    },
}

impl FailureReason {
    /// Short name of the failure class.
    pub fn name(&self) -> &'static str {
        match self {
            FailureReason::EntanglementFailure { .. } => "EntanglementFailure",
            FailureReason::InvalidOperand { .. } => "InvalidOperand",
            FailureReason::InvalidLinkState { .. } => "InvalidLinkState",
            FailureReason::UpstreamFailure { .. } => "UpstreamFailure",
            FailureReason::ResourceUnavailable { .. } => "ResourceUnavailable",
        }
    }
}

impl From<&NetError> for FailureReason {
    fn from(err: &NetError) -> Self {
        match err {
            NetError::EntanglementFailure { attempts, .. } => FailureReason::EntanglementFailure {
                attempts: *attempts,
            },
            NetError::InvalidLinkState { .. } => FailureReason::InvalidLinkState {
                detail: err.to_string(),
            },
            NetError::ResourceUnavailable { .. } => FailureReason::ResourceUnavailable {
                detail: err.to_string(),
            },
            NetError::InvalidOperand(detail) => FailureReason::InvalidOperand {
                detail: detail.clone(),
            },
            other => FailureReason::InvalidOperand {
                detail: other.to_string(),
            },
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::EntanglementFailure { attempts } => {
                write!(f, "entanglement failed after {attempts} attempts")
            }
            FailureReason::InvalidOperand { detail } => write!(f, "invalid operand: {detail}"),
            FailureReason::InvalidLinkState { detail } => write!(f, "{detail}"),
            FailureReason::UpstreamFailure { predecessor } => {
                write!(f, "upstream failure of {predecessor}")
            }
            FailureReason::ResourceUnavailable { detail } => {
                write!(f, "resource unavailable: {detail}")
            }
        }
    }
}

/// Status of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperationStatus {
    /// Waiting for predecessors.
    Blocked,
    /// Waiting for resources.
    Pending,
    /// Resources granted, about to run.
    Admitted,
    /// Holding its qubits.
    Running {
        /// Simulated start.
        started_at: SimTime,
    },
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed {
        /// Why.
        reason: FailureReason,
    },
    /// Withdrawn before it ran.
    Cancelled,
}

impl OperationStatus {
    /// Check if the operation is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Failed { .. } | OperationStatus::Cancelled
        )
    }

    /// Check if the operation may still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, OperationStatus::Pending | OperationStatus::Blocked)
    }

    /// Check if the operation is running.
    pub fn is_running(&self) -> bool {
        matches!(self, OperationStatus::Running { .. })
    }

    /// Get a human-readable status name.
    pub fn name(&self) -> &'static str {
        match self {
            OperationStatus::Blocked => "Blocked",
            OperationStatus::Pending => "Pending",
            OperationStatus::Admitted => "Admitted",
            OperationStatus::Running { .. } => "Running",
            OperationStatus::Completed => "Completed",
            OperationStatus::Failed { .. } => "Failed",
            OperationStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Failed { reason } => write!(f, "Failed ({reason})"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Result computed at admission, applied when the completion event fires.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingResult {
    pub duration: f64,
    pub result: Result<Execution, FailureReason>,
}

/// Figures of a successful execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Final fidelity.
    pub fidelity: f64,
    /// Entanglement attempts, zero for local steps.
    pub attempts: u32,
    /// Protocol timing, absent for local steps.
    pub latency: Option<LatencyBreakdown>,
}

/// A submitted operation and everything the scheduler knows about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Identifier.
    pub id: OperationId,
    /// The original request.
    pub request: OperationRequest,
    /// Current status.
    pub status: OperationStatus,
    /// Slots granted at admission.
    pub qubits: Vec<QubitRef>,
    /// Simulated submission time.
    pub submitted_at: SimTime,
    /// Simulated start.
    pub started_at: Option<SimTime>,
    /// Simulated end.
    pub finished_at: Option<SimTime>,
    /// Execution figures once completed.
    pub execution: Option<Execution>,
    /// Entanglement attempts made, successful or not.
    pub attempts: u32,
    pub(crate) pending: Option<PendingResult>,
}

impl Operation {
    pub(crate) fn new(id: OperationId, request: OperationRequest, submitted_at: SimTime) -> Self {
        Self {
            id,
            request,
            status: OperationStatus::Pending,
            qubits: Vec::new(),
            submitted_at,
            started_at: None,
            finished_at: None,
            execution: None,
            attempts: 0,
            pending: None,
        }
    }

    /// Fidelity if completed.
    pub fn fidelity(&self) -> Option<f64> {
        self.execution.map(|e| e.fidelity)
    }

    /// Wall span on the simulated clock, if it ran.
    pub fn duration(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::CRITICAL > Priority::HIGH);
        assert!(Priority::HIGH > Priority::DEFAULT);
        assert!(Priority::DEFAULT > Priority::LOW);
        assert_eq!(Priority::default(), Priority::DEFAULT);
    }

    #[test]
    fn test_request_builder() {
        let req = OperationRequest::teleport(QubitRef::new(0, 0), NodeId(1))
            .with_priority(Priority::HIGH)
            .with_arrival(SimTime::new(2.0))
            .after(OperationId(4))
            .with_label("t0");
        assert_eq!(req.operands[1], Endpoint::OnNode(NodeId(1)));
        assert_eq!(req.priority, Priority::HIGH);
        assert_eq!(req.predecessors, vec![OperationId(4)]);
        assert_eq!(req.kind.protocol(), Some(ProtocolKind::TeleData));
    }

    #[test]
    fn test_status_predicates() {
        assert!(OperationStatus::Blocked.is_cancellable());
        assert!(!OperationStatus::Running { started_at: SimTime::ZERO }.is_cancellable());
        assert!(OperationStatus::Cancelled.is_terminal());
        let failed = OperationStatus::Failed {
            reason: FailureReason::UpstreamFailure {
                predecessor: OperationId(1),
            },
        };
        assert_eq!(failed.to_string(), "Failed (upstream failure of op-1)");
    }

    #[test]
    fn test_failure_from_net_error() {
        let err = NetError::EntanglementFailure {
            a: QubitRef::new(0, 0),
            b: QubitRef::new(1, 0),
            attempts: 5,
            elapsed: 1.0,
        };
        assert_eq!(
            FailureReason::from(&err),
            FailureReason::EntanglementFailure { attempts: 5 }
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(OperationKind::Teleport.name(), "teleport");
        assert_eq!(
            OperationKind::RemoteGate { gate: GateKind::CX }.name(),
            "remote_gate:cx"
        );
        assert!(!OperationKind::Step { gate: GateKind::H }.is_communication());
    }
}
