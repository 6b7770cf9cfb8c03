//! qnet Circuit Partitioner
//!
//! Splits a logical [`qnet_ir::Circuit`] across the nodes of a network. The
//! output is a [`PartitionPlan`]: where each logical qubit lives, one
//! [`Subcircuit`] per node, and a flat list of operations with dependency
//! edges that the scheduler consumes.
//!
//! # Example
//!
//! ```rust
//! use qnet_compile::Partitioner;
//! use qnet_core::NodeId;
//! use qnet_ir::Circuit;
//!
//! let circuit = Circuit::ghz(6).unwrap();
//! let capacities = [(NodeId(0), 3), (NodeId(1), 3)];
//! let plan = Partitioner::default()
//!     .partition_into(&circuit, &capacities, 2)
//!     .unwrap();
//!
//! // Only the CX between qubits 2 and 3 crosses the boundary.
//! assert_eq!(plan.stats.cross_node_operation_count, 1);
//! ```

pub mod error;
pub mod layout;
pub mod partition;

pub use error::{CompileError, CompileResult};
pub use layout::QubitMapping;
pub use partition::{
    CommEndpoint, CommunicationPolicy, PartitionConfig, PartitionPlan, PartitionStats,
    Partitioner, PlanOpId, PlannedOpKind, PlannedOperation, Subcircuit, SubcircuitEntry,
};
