//! Error types for the partitioner.

use qnet_ir::IrError;
use thiserror::Error;

/// Errors that can occur while partitioning a circuit.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The circuit needs more qubits than the network has.
    #[error("Circuit needs {required} qubits but the network only has {available}")]
    CircuitTooLarge {
        /// Logical qubits in the circuit.
        required: u32,
        /// Total slots over all nodes.
        available: u32,
    },

    /// The requested partitioning cannot be realised.
    #[error("Invalid partition: {0}")]
    InvalidPartition(String),

    /// The plan's dependency edges form a cycle.
    #[error("Dependency cycle in partition plan at operation {0}")]
    DependencyCycle(usize),

    /// The input circuit is malformed.
    #[error("Invalid circuit: {0}")]
    Ir(#[from] IrError),
}

/// Result type for partitioning.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CompileError::CircuitTooLarge {
            required: 10,
            available: 6,
        };
        assert_eq!(
            err.to_string(),
            "Circuit needs 10 qubits but the network only has 6"
        );
    }
}
