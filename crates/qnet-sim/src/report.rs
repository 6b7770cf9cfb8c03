//! Run report.
//!
//! The top-level record of one simulation: configuration, metrics,
//! per-handle summaries and the full ledger.

use std::path::Path;

use chrono::{DateTime, Utc};
use qnet_sched::ScheduleLedger;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::driver::HandleSummary;
use crate::error::SimResult;
use crate::metrics::SimulationMetrics;

/// Report schema version.
pub const REPORT_SCHEMA_VERSION: &str = "1";

/// Complete simulation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Schema version for forward compatibility.
    pub schema_version: String,
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Wall-clock time the report was built.
    pub generated_at: DateTime<Utc>,
    /// Configuration the run used.
    pub config: SimConfig,
    /// Aggregated metrics.
    pub metrics: SimulationMetrics,
    /// One summary per submission.
    pub handles: Vec<HandleSummary>,
    /// Every terminal operation.
    pub ledger: ScheduleLedger,
}

impl SimulationReport {
    /// Stamp a new report.
    pub fn new(
        config: SimConfig,
        metrics: SimulationMetrics,
        handles: Vec<HandleSummary>,
        ledger: ScheduleLedger,
    ) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            config,
            metrics,
            handles,
            ledger,
        }
    }

    /// Pretty JSON.
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write pretty JSON to `path`.
    pub fn write_json(&self, path: impl AsRef<Path>) -> SimResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
