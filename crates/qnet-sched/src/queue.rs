//! Admission queue for pending operations.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use qnet_core::SimTime;
use rustc_hash::FxHashMap;

use crate::operation::{OperationId, Priority};

/// An entry in the admission queue.
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    id: OperationId,
    priority: Priority,
    arrival: SimTime,
    insertion_order: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then earlier arrival, then FIFO.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.arrival.cmp(&other.arrival))
            .then_with(|| self.insertion_order.cmp(&other.insertion_order))
    }
}

/// Pending operations in admission order.
///
/// Unlike a heap, admission walks the whole queue each round so that
/// lower-priority work can start on resources the head cannot use.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    entries: BTreeSet<QueueEntry>,
    index: FxHashMap<OperationId, QueueEntry>,
    counter: u64,
}

impl PriorityQueue {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation. Re-pushing an id replaces its previous entry.
    pub fn push(&mut self, id: OperationId, priority: Priority, arrival: SimTime) {
        self.remove(id);
        let entry = QueueEntry {
            id,
            priority,
            arrival,
            insertion_order: self.counter,
        };
        self.counter += 1;
        self.entries.insert(entry);
        self.index.insert(id, entry);
    }

    /// Remove and return the first operation in admission order.
    pub fn pop(&mut self) -> Option<OperationId> {
        let entry = self.entries.pop_first()?;
        self.index.remove(&entry.id);
        Some(entry.id)
    }

    /// First operation in admission order.
    pub fn peek(&self) -> Option<OperationId> {
        self.entries.first().map(|entry| entry.id)
    }

    /// Remove a specific operation.
    pub fn remove(&mut self, id: OperationId) -> bool {
        match self.index.remove(&id) {
            Some(entry) => self.entries.remove(&entry),
            None => false,
        }
    }

    /// Check if an operation is queued.
    pub fn contains(&self, id: OperationId) -> bool {
        self.index.contains_key(&id)
    }

    /// Operations in admission order.
    pub fn iter(&self) -> impl Iterator<Item = OperationId> + '_ {
        self.entries.iter().map(|entry| entry.id)
    }

    /// Get the number of queued operations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
