//! qnet Network Core
//!
//! The physical layer of the distributed quantum network simulator: which
//! QPU nodes exist and how they are wired, how entanglement links between
//! their qubit slots come into being, and how the TeleData and TeleGate
//! protocols turn a link into a state transfer or a remote gate.
//!
//! Fidelity and timing are modelled analytically. No quantum state is
//! propagated.
//!
//! # Core Components
//!
//! - **Shared types**: [`NodeId`], [`QubitRef`], [`SimTime`], [`Lease`]
//! - **Noise**: [`NoiseParams`], injectable [`Distribution`]s and the
//!   [`LinkModel`] trait with its default [`GaussianLinkModel`]
//! - **Node Registry**: [`NodeRegistry`] with slot occupancy and quantum
//!   channels
//! - **Entanglement Manager**: [`EntanglementManager`] creating single-use
//!   [`EntanglementLink`]s
//! - **Protocol Engine**: [`ProtocolEngine`] driving [`ProtocolHandler`]s
//!
//! # Example: One Teleportation
//!
//! ```rust
//! use std::sync::Arc;
//! use qnet_core::{
//!     GaussianLinkModel, Lease, Network, NodeRegistry, NoiseParams, ProtocolEngine,
//!     ProtocolRequest, QubitRef, SimTime,
//! };
//!
//! let registry = NodeRegistry::from_uniform(2, 3, NoiseParams::noiseless(0.15)).unwrap();
//! let mut network = Network::new(registry, Arc::new(GaussianLinkModel::default()), Some(42));
//! let engine = ProtocolEngine::default();
//!
//! let request = ProtocolRequest::teledata(QubitRef::new(0, 0), QubitRef::new(1, 0));
//! let outcome = engine
//!     .execute(&mut network, &request, 3, SimTime::ZERO, Lease(0))
//!     .unwrap();
//! assert!(outcome.fidelity >= 0.95);
//! ```

pub mod entanglement;
pub mod error;
pub mod network;
pub mod noise;
pub mod protocol;
pub mod registry;
pub mod types;

pub use entanglement::{EntanglementLink, EntanglementManager, EntanglementStats, LinkId};
pub use error::{NetError, NetResult};
pub use network::Network;
pub use noise::{ClampedDistribution, Distribution, GaussianLinkModel, LinkModel, NoiseParams};
pub use protocol::{
    Corrections, LatencyBreakdown, LocalOutcome, ProtocolConfig, ProtocolEngine, ProtocolFailure,
    ProtocolHandler, ProtocolKind, ProtocolOutcome, ProtocolRequest, ProtocolState, SideEffect,
    TeleDataHandler, TeleGateHandler, Transition,
};
pub use registry::{Node, NodeRegistry, NodeSpec, SlotState, Topology};
pub use types::{Lease, NodeId, QubitRef, SimTime};
