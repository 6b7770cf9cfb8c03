//! Error types for the simulation driver.

use qnet_compile::CompileError;
use qnet_core::NetError;
use qnet_ir::IrError;
use qnet_sched::SchedError;
use thiserror::Error;

use crate::driver::ScheduleHandle;

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;

/// Errors that can occur while configuring or driving a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON parse or write error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Circuit construction failed.
    #[error("Circuit error: {0}")]
    Ir(#[from] IrError),

    /// Partitioning failed.
    #[error("Partition error: {0}")]
    Compile(#[from] CompileError),

    /// Scheduler defect or misuse.
    #[error("Scheduler error: {0}")]
    Sched(#[from] SchedError),

    /// Network setup failed.
    #[error("Network error: {0}")]
    Net(#[from] NetError),

    /// Handle was not issued by this simulation.
    #[error("Unknown schedule handle: {0}")]
    HandleNotFound(ScheduleHandle),
}
