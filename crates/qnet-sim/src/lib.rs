//! qnet Simulation Driver
//!
//! Builds a network from a [`SimConfig`], feeds it protocol requests and
//! partitioned circuits, runs the scheduler to completion and reports
//! [`SimulationMetrics`].
//!
//! # Example
//!
//! ```rust
//! use qnet_core::{NoiseParams, ProtocolKind, QubitRef};
//! use qnet_sim::{NetworkConfig, SimConfig, Simulation};
//!
//! let mut config = SimConfig::default();
//! config.network = NetworkConfig::uniform(2, 3);
//! config.network.noise = NoiseParams::noiseless(0.15);
//!
//! let mut sim = Simulation::build_network(config).unwrap();
//! sim.submit_protocol(ProtocolKind::TeleData, QubitRef::new(0, 0), QubitRef::new(1, 0))
//!     .unwrap();
//! sim.run_until_idle().unwrap();
//!
//! let metrics = sim.get_metrics();
//! assert_eq!(metrics.completed, 1);
//! assert!(metrics.fidelity >= 0.95);
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod report;
pub mod workload;

pub use config::{
    AlgorithmKind, AlgorithmSpec, LinkNoise, NetworkConfig, PartitionSettings, SimConfig,
    WorkloadConfig,
};
pub use driver::{HandleSummary, ScheduleHandle, Simulation};
pub use error::{SimError, SimResult};
pub use metrics::{
    Bottlenecks, Comparison, ComparisonEntry, HIGH_LATENCY_THRESHOLD, HIGH_RESOURCE_USAGE_RATIO,
    LOW_FIDELITY_THRESHOLD, SimulationMetrics, compare_configurations,
};
pub use report::{REPORT_SCHEMA_VERSION, SimulationReport};
pub use workload::{algorithm_circuit, algorithm_circuits, protocol_workload};
