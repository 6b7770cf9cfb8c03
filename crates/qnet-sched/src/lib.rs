//! qnet Scheduler
//!
//! Discrete-event scheduling of quantum network operations onto shared
//! qubit slots.
//!
//! Operations are submitted as [`OperationRequest`]s, optionally with
//! predecessors. The [`Scheduler`] keeps them `Blocked` until every
//! predecessor completes, then admits them by descending priority and
//! ascending arrival whenever their qubits are idle. Communication
//! operations run through the protocol engine; local steps run through the
//! local gate executor. Every terminal operation lands in the
//! [`ScheduleLedger`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use qnet_core::{GaussianLinkModel, Network, NodeRegistry, NoiseParams, ProtocolEngine, QubitRef};
//! use qnet_sched::{OperationRequest, Scheduler, SchedulerConfig};
//!
//! let registry = NodeRegistry::from_uniform(2, 3, NoiseParams::default()).unwrap();
//! let network = Network::new(registry, Arc::new(GaussianLinkModel::default()), Some(42));
//! let mut scheduler = Scheduler::new(network, ProtocolEngine::default(), SchedulerConfig::default());
//!
//! let first = scheduler
//!     .submit(OperationRequest::teleport(QubitRef::new(0, 0), QubitRef::new(1, 0)))
//!     .unwrap();
//! scheduler
//!     .submit(OperationRequest::teleport(QubitRef::new(1, 0), QubitRef::new(0, 1)).after(first))
//!     .unwrap();
//!
//! let ledger = scheduler.run_until_idle().unwrap();
//! assert_eq!(ledger.len(), 2);
//! ```

pub mod error;
pub mod event;
pub mod graph;
pub mod ledger;
pub mod operation;
pub mod queue;
pub mod scheduler;

pub use error::{SchedError, SchedResult};
pub use event::{EventKind, EventQueue};
pub use graph::DependencyGraph;
pub use ledger::{LedgerEntry, Outcome, ScheduleLedger};
pub use operation::{
    Endpoint, Execution, FailureReason, Operation, OperationId, OperationKind, OperationRequest,
    OperationStatus, Priority,
};
pub use queue::PriorityQueue;
pub use scheduler::{Scheduler, SchedulerConfig};
