//! Node registry: QPU descriptors, slot occupancy and quantum channels.
//!
//! Topology is fixed once the registry is built; only slot occupancy,
//! channel usage and accumulated busy time change afterwards.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{NetError, NetResult};
use crate::noise::NoiseParams;
use crate::types::{Lease, NodeId, QubitRef};

/// How nodes are wired together by quantum channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Every pair of nodes shares a channel.
    #[default]
    FullyConnected,
    /// Node `i` is connected to node `i + 1`.
    Linear,
    /// A line closed back onto node 0.
    Ring,
    /// Explicit list of connected pairs.
    Custom(Vec<(NodeId, NodeId)>),
}

impl Topology {
    /// Connected pairs for `count` nodes, each as `(lower, higher)`.
    fn edges(&self, count: u32) -> NetResult<Vec<(NodeId, NodeId)>> {
        let mut edges = Vec::new();
        match self {
            Topology::FullyConnected => {
                for a in 0..count {
                    for b in (a + 1)..count {
                        edges.push((NodeId(a), NodeId(b)));
                    }
                }
            }
            Topology::Linear | Topology::Ring => {
                for a in 1..count {
                    edges.push((NodeId(a - 1), NodeId(a)));
                }
                if matches!(self, Topology::Ring) && count > 2 {
                    edges.push((NodeId(0), NodeId(count - 1)));
                }
            }
            Topology::Custom(pairs) => {
                for &(a, b) in pairs {
                    if a == b || a.0 >= count || b.0 >= count {
                        return Err(NetError::InvalidConfig(format!(
                            "custom topology edge ({a}, {b}) is invalid for {count} nodes"
                        )));
                    }
                    edges.push(channel_key(a, b));
                }
            }
        }
        Ok(edges)
    }
}

/// Description of a node to build.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Number of qubit slots.
    pub capacity: u32,
    /// Noise parameters.
    #[serde(default)]
    pub noise: NoiseParams,
}

/// Occupancy of one qubit slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    /// Free to acquire.
    Idle,
    /// Held under a lease.
    Busy {
        /// Current holder.
        lease: Lease,
    },
}

/// A QPU node.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    capacity: u32,
    noise: NoiseParams,
    slots: Vec<SlotState>,
    busy_time: f64,
}

impl Node {
    /// Node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Number of qubit slots.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Noise parameters.
    pub fn noise(&self) -> &NoiseParams {
        &self.noise
    }

    /// State of one slot.
    pub fn slot_state(&self, slot: u32) -> Option<SlotState> {
        self.slots.get(slot as usize).copied()
    }

    /// Number of slots currently held.
    pub fn busy_slots(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, SlotState::Busy { .. }))
            .count()
    }

    /// Idle slots in ascending slot order.
    pub fn idle_slots(&self) -> impl Iterator<Item = QubitRef> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == SlotState::Idle)
            .map(move |(i, _)| QubitRef::new(self.id, i as u32))
    }

    /// Accumulated busy seconds, normalised by capacity.
    pub fn busy_time(&self) -> f64 {
        self.busy_time
    }
}

#[derive(Debug, Clone, Copy)]
struct Channel {
    slots: u32,
    in_use: u32,
}

fn channel_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Registry of the network's nodes and channels.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
    topology: Topology,
    channels: FxHashMap<(NodeId, NodeId), Channel>,
    link_noise: FxHashMap<(NodeId, NodeId), NoiseParams>,
}

impl NodeRegistry {
    /// Build a registry; node ids follow the order of `specs`.
    pub fn new(specs: Vec<NodeSpec>, topology: Topology) -> NetResult<Self> {
        if specs.is_empty() {
            return Err(NetError::InvalidConfig(
                "network needs at least one node".into(),
            ));
        }

        let mut nodes = Vec::with_capacity(specs.len());
        for (i, spec) in specs.into_iter().enumerate() {
            if spec.capacity == 0 {
                return Err(NetError::InvalidConfig(format!(
                    "node {i} has zero qubit capacity"
                )));
            }
            spec.noise.validate()?;
            nodes.push(Node {
                id: NodeId(i as u32),
                capacity: spec.capacity,
                noise: spec.noise,
                slots: vec![SlotState::Idle; spec.capacity as usize],
                busy_time: 0.0,
            });
        }

        let channels = topology
            .edges(nodes.len() as u32)?
            .into_iter()
            .map(|key| (key, Channel { slots: 1, in_use: 0 }))
            .collect::<FxHashMap<_, _>>();

        info!(
            nodes = nodes.len(),
            channels = channels.len(),
            capacity = nodes.iter().map(|n| n.capacity).sum::<u32>(),
            "Network registry built"
        );

        Ok(Self {
            nodes,
            topology,
            channels,
            link_noise: FxHashMap::default(),
        })
    }

    /// Fully connected network of identical nodes.
    pub fn from_uniform(count: u32, qubits_per_node: u32, noise: NoiseParams) -> NetResult<Self> {
        let specs = (0..count)
            .map(|_| NodeSpec {
                capacity: qubits_per_node,
                noise,
            })
            .collect();
        Self::new(specs, Topology::FullyConnected)
    }

    /// Set the number of concurrent link generations every channel supports.
    pub fn with_channel_slots(mut self, slots: u32) -> NetResult<Self> {
        if slots == 0 {
            return Err(NetError::InvalidConfig(
                "channels need at least one link-generation slot".into(),
            ));
        }
        for channel in self.channels.values_mut() {
            channel.slots = slots;
        }
        Ok(self)
    }

    /// Override the noise parameters used for links between `a` and `b`.
    pub fn set_link_noise(&mut self, a: NodeId, b: NodeId, noise: NoiseParams) -> NetResult<()> {
        noise.validate()?;
        if !self.connected(a, b) {
            return Err(NetError::InvalidConfig(format!(
                "cannot set link noise: {a} and {b} are not connected"
            )));
        }
        self.link_noise.insert(channel_key(a, b), noise);
        Ok(())
    }

    // =========================================================================
    // Topology
    // =========================================================================

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the registry has no nodes. Never true for a built registry.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The topology the registry was built with.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Sum of all node capacities.
    pub fn total_capacity(&self) -> u32 {
        self.nodes.iter().map(|n| n.capacity).sum()
    }

    /// `(node, capacity)` in ascending node order.
    pub fn capacities(&self) -> Vec<(NodeId, u32)> {
        self.nodes.iter().map(|n| (n.id, n.capacity)).collect()
    }

    /// Check that a reference names an existing slot.
    pub fn validate_ref(&self, qubit: QubitRef) -> NetResult<()> {
        match self.node(qubit.node) {
            None => Err(NetError::InvalidOperand(format!(
                "{qubit}: unknown node {}",
                qubit.node
            ))),
            Some(node) if qubit.slot >= node.capacity => Err(NetError::InvalidOperand(format!(
                "{qubit}: slot out of range for a {}-qubit node",
                node.capacity
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Whether a quantum channel joins `a` and `b`.
    pub fn connected(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.channels.contains_key(&channel_key(a, b))
    }

    /// Nodes sharing a channel with `node`, ascending.
    pub fn neighbours(&self, node: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .channels
            .keys()
            .filter_map(|&(a, b)| {
                if a == node {
                    Some(b)
                } else if b == node {
                    Some(a)
                } else {
                    None
                }
            })
            .collect();
        out.sort();
        out
    }

    /// Noise parameters governing a link between `a` and `b`, one per side.
    ///
    /// A per-link override applies to both sides.
    pub fn noise_between(&self, a: NodeId, b: NodeId) -> NetResult<(NoiseParams, NoiseParams)> {
        if let Some(noise) = self.link_noise.get(&channel_key(a, b)) {
            return Ok((*noise, *noise));
        }
        let na = self
            .node(a)
            .ok_or_else(|| NetError::InvalidOperand(format!("unknown node {a}")))?;
        let nb = self
            .node(b)
            .ok_or_else(|| NetError::InvalidOperand(format!("unknown node {b}")))?;
        Ok((na.noise, nb.noise))
    }

    // =========================================================================
    // Occupancy
    // =========================================================================

    /// Whether a slot is idle. Unknown slots are never idle.
    pub fn is_idle(&self, qubit: QubitRef) -> bool {
        self.holder(qubit).is_none() && self.validate_ref(qubit).is_ok()
    }

    /// Current holder of a slot.
    pub fn holder(&self, qubit: QubitRef) -> Option<Lease> {
        match self.node(qubit.node)?.slot_state(qubit.slot)? {
            SlotState::Idle => None,
            SlotState::Busy { lease } => Some(lease),
        }
    }

    /// Idle slots on a node, ascending.
    pub fn idle_slots(&self, node: NodeId) -> Vec<QubitRef> {
        self.node(node)
            .map(|n| n.idle_slots().collect())
            .unwrap_or_default()
    }

    /// Number of held slots on a node.
    pub fn busy_slots(&self, node: NodeId) -> usize {
        self.node(node).map(Node::busy_slots).unwrap_or(0)
    }

    fn slot_mut(&mut self, qubit: QubitRef) -> NetResult<&mut SlotState> {
        self.validate_ref(qubit)?;
        Ok(&mut self.nodes[qubit.node.index()].slots[qubit.slot as usize])
    }

    /// Mark every slot in `qubits` busy under `lease`, or none of them.
    ///
    /// Slots already held by the same lease are accepted. Returns the slots
    /// that were newly acquired, so a caller can release exactly those.
    pub fn acquire(&mut self, qubits: &[QubitRef], lease: Lease) -> NetResult<Vec<QubitRef>> {
        for &qubit in qubits {
            self.validate_ref(qubit)?;
            if let Some(holder) = self.holder(qubit) {
                if holder != lease {
                    return Err(NetError::ResourceUnavailable {
                        qubit,
                        reason: format!("held by {holder}, requested by {lease}"),
                    });
                }
            }
        }

        let mut acquired = Vec::new();
        for &qubit in qubits {
            let slot = self.slot_mut(qubit)?;
            if *slot == SlotState::Idle {
                *slot = SlotState::Busy { lease };
                acquired.push(qubit);
            }
        }
        debug!(%lease, qubits = ?acquired, "Acquired slots");
        Ok(acquired)
    }

    /// Return slots held by `lease` to idle. Already idle slots are ignored.
    pub fn release(&mut self, qubits: &[QubitRef], lease: Lease) -> NetResult<()> {
        for &qubit in qubits {
            self.validate_ref(qubit)?;
            if let Some(holder) = self.holder(qubit) {
                if holder != lease {
                    return Err(NetError::ResourceUnavailable {
                        qubit,
                        reason: format!("held by {holder}, released by {lease}"),
                    });
                }
            }
        }
        for &qubit in qubits {
            *self.slot_mut(qubit)? = SlotState::Idle;
        }
        debug!(%lease, ?qubits, "Released slots");
        Ok(())
    }

    /// Charge `seconds` of single-slot busy time to a node.
    pub fn record_busy(&mut self, node: NodeId, seconds: f64) {
        if let Some(n) = self.nodes.get_mut(node.index()) {
            n.busy_time += seconds.max(0.0) / f64::from(n.capacity);
        }
    }

    /// Accumulated busy time of a node.
    pub fn busy_time(&self, node: NodeId) -> f64 {
        self.node(node).map(Node::busy_time).unwrap_or(0.0)
    }

    /// Sum of busy time over all nodes.
    pub fn total_busy_time(&self) -> f64 {
        self.nodes.iter().map(|n| n.busy_time).sum()
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Whether the channel between `a` and `b` has a free generation slot.
    pub fn channel_available(&self, a: NodeId, b: NodeId) -> bool {
        self.channels
            .get(&channel_key(a, b))
            .is_some_and(|c| c.in_use < c.slots)
    }

    /// Occupy one generation slot on the channel.
    pub fn reserve_channel(&mut self, a: NodeId, b: NodeId) -> NetResult<()> {
        let channel = self
            .channels
            .get_mut(&channel_key(a, b))
            .ok_or_else(|| NetError::InvalidOperand(format!("{a} and {b} are not connected")))?;
        if channel.in_use >= channel.slots {
            return Err(NetError::ResourceUnavailable {
                qubit: QubitRef::new(a, 0),
                reason: format!("channel {a}-{b} saturated"),
            });
        }
        channel.in_use += 1;
        Ok(())
    }

    /// Free one generation slot on the channel.
    pub fn release_channel(&mut self, a: NodeId, b: NodeId) {
        if let Some(channel) = self.channels.get_mut(&channel_key(a, b)) {
            channel.in_use = channel.in_use.saturating_sub(1);
        }
    }
}
