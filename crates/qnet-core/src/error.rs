//! Error types for the network core.

use thiserror::Error;

use crate::entanglement::LinkId;
use crate::types::QubitRef;

/// Errors raised by the registry, entanglement manager and protocol engine.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum NetError {
    /// Every attempt in the budget failed to produce a link.
    #[error("Entanglement failed between {a} and {b} after {attempts} attempts")]
    EntanglementFailure {
        /// First endpoint.
        a: QubitRef,
        /// Second endpoint.
        b: QubitRef,
        /// Attempts made before giving up.
        attempts: u32,
        /// Simulated seconds spent on the failed attempts.
        elapsed: f64,
    },

    /// Malformed or unsupported qubit pairing.
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    /// Link consumed twice or never created.
    #[error("Invalid state for {link}: {reason}")]
    InvalidLinkState {
        /// The link in question.
        link: LinkId,
        /// What was wrong with it.
        reason: String,
    },

    /// A qubit slot was held by someone else.
    #[error("Resource unavailable: {qubit} ({reason})")]
    ResourceUnavailable {
        /// The contended slot.
        qubit: QubitRef,
        /// Who holds it.
        reason: String,
    },

    /// No handler registered for a protocol kind.
    #[error("No handler registered for protocol '{0}'")]
    UnknownProtocol(String),

    /// Network or protocol parameters out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Distribution parameters that cannot be sampled.
    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),
}

impl NetError {
    /// Short stable name of the error class, used in ledgers and logs.
    pub fn class(&self) -> &'static str {
        match self {
            NetError::EntanglementFailure { .. } => "EntanglementFailure",
            NetError::InvalidOperand(_) => "InvalidOperand",
            NetError::InvalidLinkState { .. } => "InvalidLinkState",
            NetError::ResourceUnavailable { .. } => "ResourceUnavailable",
            NetError::UnknownProtocol(_) => "UnknownProtocol",
            NetError::InvalidConfig(_) => "InvalidConfig",
            NetError::InvalidDistribution(_) => "InvalidDistribution",
        }
    }
}

/// Result type for network core operations.
pub type NetResult<T> = Result<T, NetError>;
