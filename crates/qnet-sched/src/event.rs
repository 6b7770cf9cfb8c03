//! Future events on the simulated clock.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use qnet_core::{NodeId, SimTime};

use crate::operation::OperationId;

/// Something that happens at a point in simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A running operation finishes and frees its qubits.
    Completion(OperationId),
    /// A queued operation becomes eligible to start.
    Arrival(OperationId),
    /// Link generation between two nodes ends and frees the channel.
    ChannelRelease(NodeId, NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduledEvent {
    time: SimTime,
    seq: u64,
    kind: EventKind,
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; earliest time and lowest sequence win.
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-queue of events ordered by time, ties broken by scheduling order.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<ScheduledEvent>,
    counter: u64,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an event.
    pub fn push(&mut self, time: SimTime, kind: EventKind) {
        self.heap.push(ScheduledEvent {
            time,
            seq: self.counter,
            kind,
        });
        self.counter += 1;
    }

    /// Time of the next event.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|event| event.time)
    }

    /// Remove the next event if it is due at or before `time`.
    pub fn pop_due(&mut self, time: SimTime) -> Option<(SimTime, EventKind)> {
        if self.heap.peek()?.time > time {
            return None;
        }
        self.heap.pop().map(|event| (event.time, event.kind))
    }

    /// Number of scheduled events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_then_sequence_order() {
        let mut events = EventQueue::new();
        events.push(SimTime::new(2.0), EventKind::Completion(OperationId(0)));
        events.push(SimTime::new(1.0), EventKind::Arrival(OperationId(1)));
        events.push(SimTime::new(1.0), EventKind::Completion(OperationId(2)));

        assert_eq!(events.peek_time(), Some(SimTime::new(1.0)));
        let first = events.pop_due(SimTime::new(1.0)).unwrap();
        assert_eq!(first.1, EventKind::Arrival(OperationId(1)));
        let second = events.pop_due(SimTime::new(1.0)).unwrap();
        assert_eq!(second.1, EventKind::Completion(OperationId(2)));
        assert!(events.pop_due(SimTime::new(1.0)).is_none());
        assert_eq!(events.len(), 1);
    }
}
