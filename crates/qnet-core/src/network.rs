//! The mutable network state owned by one simulation run.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::info;

use crate::entanglement::{EntanglementLink, EntanglementManager};
use crate::error::NetResult;
use crate::noise::LinkModel;
use crate::registry::NodeRegistry;
use crate::types::{Lease, QubitRef, SimTime};

/// Registry, entanglement manager and the run's single random source.
///
/// Each simulation owns its own `Network`, so independent runs never share
/// state.
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) registry: NodeRegistry,
    pub(crate) entanglement: EntanglementManager,
    pub(crate) rng: StdRng,
}

impl Network {
    /// Assemble a network. Without a seed the random source is drawn from
    /// system entropy once, here.
    pub fn new(registry: NodeRegistry, model: Arc<dyn LinkModel>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(nodes = registry.len(), ?seed, "Network ready");
        Self {
            registry,
            entanglement: EntanglementManager::new(model),
            rng,
        }
    }

    /// Node registry.
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Mutable node registry.
    pub fn registry_mut(&mut self) -> &mut NodeRegistry {
        &mut self.registry
    }

    /// Entanglement manager.
    pub fn entanglement(&self) -> &EntanglementManager {
        &self.entanglement
    }

    /// Mutable entanglement manager.
    pub fn entanglement_mut(&mut self) -> &mut EntanglementManager {
        &mut self.entanglement
    }

    /// The run's random source.
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Create a link using the network's own random source.
    pub fn create_link(
        &mut self,
        a: QubitRef,
        b: QubitRef,
        attempt_budget: u32,
        now: SimTime,
        lease: Lease,
    ) -> NetResult<EntanglementLink> {
        self.entanglement.create_link(
            &mut self.registry,
            &mut self.rng,
            a,
            b,
            attempt_budget,
            now,
            lease,
        )
    }
}
