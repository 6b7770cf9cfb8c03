//! Error handling for the scheduler.

use qnet_core::NetError;
use thiserror::Error;

use crate::operation::OperationId;

/// Result type for scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that can occur during scheduler operations.
///
/// Failures of individual operations are not errors; they are recorded on
/// the operation and in the ledger. These variants cover misuse of the
/// scheduler and broken invariants.
#[derive(Error, Debug)]
pub enum SchedError {
    /// Operation not known to the scheduler.
    #[error("Operation not found: {0}")]
    OperationNotFound(OperationId),

    /// Invalid operation state for the requested action.
    #[error("Invalid state for {id}: expected {expected}, found {found}")]
    InvalidOperationState {
        /// The operation.
        id: OperationId,
        /// States that would have been accepted.
        expected: String,
        /// Actual state.
        found: String,
    },

    /// Dependency cycle detected.
    #[error("Dependency cycle detected between operations")]
    DependencyCycle,

    /// Invalid dependency reference.
    #[error("Invalid dependency: operation {0} not found")]
    InvalidDependency(OperationId),

    /// A resource was double-booked. Indicates a scheduler defect.
    #[error("Resource unavailable (scheduler invariant violated): {0}")]
    ResourceUnavailable(String),

    /// Work remains but nothing can ever start.
    #[error("Scheduler stalled with {pending} pending and {blocked} blocked operations")]
    Stalled {
        /// Operations waiting for resources.
        pending: usize,
        /// Operations waiting for dependencies.
        blocked: usize,
    },

    /// Error from the network layer.
    #[error("Network error: {0}")]
    Net(#[from] NetError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
