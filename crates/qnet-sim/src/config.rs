//! Simulation configuration.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML, or JSON by extension)
//! 2. Environment variables (with QNET_ prefix)
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use qnet_compile::{CommunicationPolicy, PartitionConfig};
use qnet_core::{
    GaussianLinkModel, Network, NodeId, NodeRegistry, NodeSpec, NoiseParams, ProtocolConfig,
    Topology,
};
use qnet_sched::SchedulerConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SimError, SimResult};

/// Complete simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Network shape and noise.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Protocol timings and fidelity factors.
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Partitioner settings.
    #[serde(default)]
    pub partition: PartitionSettings,

    /// Generated workload.
    #[serde(default)]
    pub workload: WorkloadConfig,
}

/// Network settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Number of nodes.
    #[serde(default = "default_nodes")]
    pub nodes: u32,

    /// Qubit slots on every node, unless `node_qubits` is given.
    #[serde(default = "default_qubits_per_node")]
    pub qubits_per_node: u32,

    /// Qubit slots per node, one entry per node.
    #[serde(default)]
    pub node_qubits: Option<Vec<u32>>,

    /// Noise applied to every node without an override.
    #[serde(default)]
    pub noise: NoiseParams,

    /// Noise overrides keyed by node index.
    #[serde(default)]
    pub node_noise: BTreeMap<u32, NoiseParams>,

    /// Noise overrides for individual links.
    #[serde(default)]
    pub link_noise: Vec<LinkNoise>,

    /// Channel layout.
    #[serde(default)]
    pub topology: Topology,

    /// Concurrent link generations per channel.
    #[serde(default = "default_channel_slots")]
    pub channel_slots: u32,

    /// Link fidelity before noise penalties.
    #[serde(default = "default_base_fidelity")]
    pub base_fidelity: f64,

    /// Seed for every random draw; `None` seeds from entropy.
    #[serde(default = "default_seed")]
    pub seed: Option<u64>,
}

/// Noise override for the link between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkNoise {
    /// One end.
    pub a: u32,
    /// Other end.
    pub b: u32,
    /// Parameters used for links on this channel.
    pub noise: NoiseParams,
}

/// Partitioner settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionSettings {
    /// Protocol choice for cross-node gates.
    #[serde(default)]
    pub policy: CommunicationPolicy,

    /// Split circuits into exactly this many nested blocks. Without it,
    /// circuits fill nodes greedily in ascending order.
    #[serde(default)]
    pub partitions: Option<usize>,
}

impl PartitionSettings {
    /// Partitioner configuration.
    pub fn partitioner_config(&self) -> PartitionConfig {
        PartitionConfig {
            policy: self.policy,
        }
    }
}

/// Algorithm circuit families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// GHZ state preparation.
    Ghz,
    /// Quantum Fourier transform.
    Qft,
    /// Grover search marking the all-ones state.
    Grover,
}

impl AlgorithmKind {
    /// Short name.
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::Ghz => "ghz",
            AlgorithmKind::Qft => "qft",
            AlgorithmKind::Grover => "grover",
        }
    }
}

impl std::str::FromStr for AlgorithmKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ghz" => Ok(AlgorithmKind::Ghz),
            "qft" => Ok(AlgorithmKind::Qft),
            "grover" => Ok(AlgorithmKind::Grover),
            other => Err(SimError::Config(format!("unknown algorithm: {other}"))),
        }
    }
}

/// One algorithm circuit in the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmSpec {
    /// Family.
    pub kind: AlgorithmKind,
    /// Logical qubits.
    pub qubits: u32,
}

/// Generated workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Teleportations in the protocol workload.
    #[serde(default = "default_operations")]
    pub operations: usize,

    /// Remote gates added per teleportation.
    #[serde(default = "default_remote_gate_share")]
    pub remote_gate_share: f64,

    /// Algorithm circuits submitted after the protocol workload.
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<AlgorithmSpec>,

    /// Grover iterations.
    #[serde(default = "default_grover_iterations")]
    pub grover_iterations: u32,
}

fn default_nodes() -> u32 {
    2
}

fn default_qubits_per_node() -> u32 {
    3
}

fn default_channel_slots() -> u32 {
    1
}

fn default_base_fidelity() -> f64 {
    0.985
}

fn default_seed() -> Option<u64> {
    Some(42)
}

fn default_operations() -> usize {
    50
}

fn default_remote_gate_share() -> f64 {
    0.5
}

fn default_algorithms() -> Vec<AlgorithmSpec> {
    vec![
        AlgorithmSpec {
            kind: AlgorithmKind::Grover,
            qubits: 4,
        },
        AlgorithmSpec {
            kind: AlgorithmKind::Qft,
            qubits: 4,
        },
    ]
}

fn default_grover_iterations() -> u32 {
    2
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            qubits_per_node: default_qubits_per_node(),
            node_qubits: None,
            noise: NoiseParams::default(),
            node_noise: BTreeMap::new(),
            link_noise: Vec::new(),
            topology: Topology::default(),
            channel_slots: default_channel_slots(),
            base_fidelity: default_base_fidelity(),
            seed: default_seed(),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            operations: default_operations(),
            remote_gate_share: default_remote_gate_share(),
            algorithms: default_algorithms(),
            grover_iterations: default_grover_iterations(),
        }
    }
}

impl NetworkConfig {
    /// Uniform network with default noise.
    pub fn uniform(nodes: u32, qubits_per_node: u32) -> Self {
        Self {
            nodes,
            qubits_per_node,
            ..Self::default()
        }
    }

    /// Slot count of each node.
    pub fn capacities(&self) -> Vec<u32> {
        match &self.node_qubits {
            Some(list) => list.clone(),
            None => vec![self.qubits_per_node; self.nodes as usize],
        }
    }

    /// Build the node registry.
    pub fn build_registry(&self) -> SimResult<NodeRegistry> {
        let specs = self
            .capacities()
            .into_iter()
            .enumerate()
            .map(|(i, capacity)| NodeSpec {
                capacity,
                noise: self
                    .node_noise
                    .get(&(i as u32))
                    .copied()
                    .unwrap_or(self.noise),
            })
            .collect();

        let mut registry =
            NodeRegistry::new(specs, self.topology.clone())?.with_channel_slots(self.channel_slots)?;
        for link in &self.link_noise {
            registry.set_link_noise(NodeId(link.a), NodeId(link.b), link.noise)?;
        }
        Ok(registry)
    }

    /// Build the registry and wrap it in a seeded network.
    pub fn build_network(&self) -> SimResult<Network> {
        let registry = self.build_registry()?;
        let model = GaussianLinkModel::with_base_fidelity(self.base_fidelity);
        model.validate()?;
        Ok(Network::new(registry, Arc::new(model), self.seed))
    }
}

impl SimConfig {
    /// Load configuration from a YAML or JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config: SimConfig = if is_json {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml_ng::from_str(&contents)?
        };
        debug!(path = %path.display(), "Loaded configuration");

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn merge_env(&mut self) -> SimResult<()> {
        self.merge_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    ///
    /// Recognised: `QNET_SEED`, `QNET_NODES`, `QNET_QUBITS_PER_NODE`,
    /// `QNET_ATTEMPT_BUDGET`.
    pub fn merge_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> SimResult<()> {
        if let Some(seed) = lookup("QNET_SEED") {
            self.network.seed = Some(parse_var("QNET_SEED", &seed)?);
        }
        if let Some(nodes) = lookup("QNET_NODES") {
            self.network.nodes = parse_var("QNET_NODES", &nodes)?;
            self.network.node_qubits = None;
        }
        if let Some(qubits) = lookup("QNET_QUBITS_PER_NODE") {
            self.network.qubits_per_node = parse_var("QNET_QUBITS_PER_NODE", &qubits)?;
            self.network.node_qubits = None;
        }
        if let Some(budget) = lookup("QNET_ATTEMPT_BUDGET") {
            self.scheduler.attempt_budget = parse_var("QNET_ATTEMPT_BUDGET", &budget)?;
        }
        self.validate()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SimResult<()> {
        let network = &self.network;
        if network.nodes == 0 {
            return Err(SimError::Config("nodes must be at least 1".into()));
        }
        match &network.node_qubits {
            Some(list) if list.len() != network.nodes as usize => {
                return Err(SimError::Config(format!(
                    "node_qubits lists {} nodes but nodes is {}",
                    list.len(),
                    network.nodes
                )));
            }
            Some(list) if list.contains(&0) => {
                return Err(SimError::Config("node_qubits entries must be positive".into()));
            }
            None if network.qubits_per_node == 0 => {
                return Err(SimError::Config("qubits_per_node must be at least 1".into()));
            }
            _ => {}
        }
        if network.channel_slots == 0 {
            return Err(SimError::Config("channel_slots must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&network.base_fidelity) {
            return Err(SimError::Config(format!(
                "base_fidelity must be within [0, 1], got {}",
                network.base_fidelity
            )));
        }
        network.noise.validate()?;
        for (node, noise) in &network.node_noise {
            if *node >= network.nodes {
                return Err(SimError::Config(format!(
                    "node_noise refers to node {node} of {}",
                    network.nodes
                )));
            }
            noise.validate()?;
        }
        for link in &network.link_noise {
            if link.a >= network.nodes || link.b >= network.nodes || link.a == link.b {
                return Err(SimError::Config(format!(
                    "link_noise ({}, {}) is not a valid node pair",
                    link.a, link.b
                )));
            }
            link.noise.validate()?;
        }

        self.protocol.validate()?;
        if self.scheduler.attempt_budget == 0 {
            return Err(SimError::Config("attempt_budget must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.workload.remote_gate_share) {
            return Err(SimError::Config(format!(
                "remote_gate_share must be within [0, 1], got {}",
                self.workload.remote_gate_share
            )));
        }
        if self.partition.partitions == Some(0) {
            return Err(SimError::Config("partitions must be at least 1".into()));
        }
        Ok(())
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> SimResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> SimResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SimError::Config(format!("{name} has invalid value {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_calibration() {
        let config = SimConfig::default();
        assert_eq!(config.network.nodes, 2);
        assert_eq!(config.network.qubits_per_node, 3);
        assert_eq!(config.network.noise.mean_link_latency, 0.15);
        assert_eq!(config.protocol.classical_latency, 0.1);
        assert_eq!(config.network.seed, Some(42));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let yaml = r#"
network:
  nodes: 3
  qubits_per_node: 2
  topology: ring
  node_noise:
    1:
      channel_noise: 0.2
scheduler:
  attempt_budget: 4
workload:
  operations: 12
  algorithms:
    - kind: ghz
      qubits: 5
"#;
        let config: SimConfig = serde_yaml_ng::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.network.topology, Topology::Ring);
        assert_eq!(config.network.node_noise[&1].channel_noise, 0.2);
        assert_eq!(config.network.node_noise[&1].fidelity_loss_rate, 0.01);
        assert_eq!(config.scheduler.attempt_budget, 4);
        assert_eq!(config.workload.remote_gate_share, 0.5);
        assert_eq!(config.workload.algorithms[0].kind, AlgorithmKind::Ghz);
        assert_eq!(config.protocol, ProtocolConfig::default());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = SimConfig::default();
        config.network.node_qubits = Some(vec![2, 2, 2]);
        assert!(matches!(config.validate(), Err(SimError::Config(_))));

        let mut config = SimConfig::default();
        config.network.noise.channel_noise = 1.5;
        assert!(matches!(config.validate(), Err(SimError::Net(_))));

        let mut config = SimConfig::default();
        config.protocol.classical_latency = -1.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.network.link_noise.push(LinkNoise {
            a: 0,
            b: 0,
            noise: NoiseParams::default(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SimConfig::default();
        config.network.node_qubits = Some(vec![3, 3]);
        config
            .merge_env_from(|key| match key {
                "QNET_SEED" => Some("7".into()),
                "QNET_NODES" => Some("4".into()),
                "QNET_ATTEMPT_BUDGET" => Some(" 20 ".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.network.seed, Some(7));
        assert_eq!(config.network.nodes, 4);
        assert_eq!(config.network.node_qubits, None);
        assert_eq!(config.scheduler.attempt_budget, 20);

        let err = config
            .merge_env_from(|key| (key == "QNET_NODES").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("QNET_NODES"));
    }

    #[test]
    fn test_build_registry_with_overrides() {
        let mut network = NetworkConfig::uniform(3, 2);
        network.node_qubits = Some(vec![1, 2, 3]);
        network.link_noise.push(LinkNoise {
            a: 0,
            b: 2,
            noise: NoiseParams::noiseless(0.3),
        });
        let registry = network.build_registry().unwrap();
        assert_eq!(registry.total_capacity(), 6);
        let (a, b) = registry.noise_between(NodeId(2), NodeId(0)).unwrap();
        assert_eq!(a.mean_link_latency, 0.3);
        assert_eq!(b.channel_noise, 0.0);
    }
}
