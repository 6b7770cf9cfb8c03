//! Append-only record of finished operations.

use qnet_core::{QubitRef, SimTime};
use serde::{Deserialize, Serialize};

use crate::error::SchedResult;
use crate::operation::{FailureReason, OperationId};

/// How an operation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Ran to completion.
    Completed,
    /// Failed, during execution or before it.
    Failed {
        /// Why.
        #[serde(flatten)]
        reason: FailureReason,
    },
    /// Withdrawn while pending or blocked.
    Cancelled,
}

impl Outcome {
    /// Check if this is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    /// Short name.
    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Failed { .. } => "failed",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// One finished operation.
///
/// Operations that never ran have `start_time == end_time` and no qubits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// The operation.
    pub operation_id: OperationId,
    /// Label from the request.
    pub label: Option<String>,
    /// Operation kind name.
    pub kind: String,
    /// Whether the operation carried cross-node communication.
    pub communication: bool,
    /// Simulated start.
    pub start_time: SimTime,
    /// Simulated end.
    pub end_time: SimTime,
    /// Fidelity on success.
    pub fidelity: Option<f64>,
    /// How it ended.
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Slots held while running.
    pub qubits: Vec<QubitRef>,
    /// Entanglement attempts made.
    pub attempts: u32,
}

impl LedgerEntry {
    /// Seconds between start and end.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Whether the operation held resources.
    pub fn ran(&self) -> bool {
        !self.qubits.is_empty()
    }
}

/// The schedule ledger. Entries are appended in completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleLedger {
    entries: Vec<LedgerEntry>,
}

impl ScheduleLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    /// All entries.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Iterate over entries.
    pub fn iter(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter()
    }

    /// Entry for an operation.
    pub fn get(&self, id: OperationId) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.operation_id == id)
    }

    /// Completed entries.
    pub fn completed(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(|e| e.outcome.is_success())
    }

    /// Failed entries.
    pub fn failed(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Failed { .. }))
    }

    /// Latest end time, or zero.
    pub fn horizon(&self) -> SimTime {
        self.entries
            .iter()
            .map(|e| e.end_time)
            .max()
            .unwrap_or(SimTime::ZERO)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> SchedResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<'a> IntoIterator for &'a ScheduleLedger {
    type Item = &'a LedgerEntry;
    type IntoIter = std::slice::Iter<'a, LedgerEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
