//! Entanglement manager: creation and single-use consumption of links.

use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{NetError, NetResult};
use crate::noise::{GaussianLinkModel, LinkModel};
use crate::registry::NodeRegistry;
use crate::types::{Lease, QubitRef, SimTime};

/// Identifier of an entanglement link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// A shared entangled pair between two slots on different nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntanglementLink {
    /// Link id.
    pub id: LinkId,
    /// First endpoint.
    pub a: QubitRef,
    /// Second endpoint.
    pub b: QubitRef,
    /// Fidelity in `[0, 1]`.
    pub fidelity: f64,
    /// Time at which the link became available.
    pub created_at: SimTime,
    /// Seconds spent generating it, failed attempts included.
    pub latency: f64,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// Whether a protocol has used it up.
    pub consumed: bool,
}

/// Running counters of the manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EntanglementStats {
    /// Links successfully created.
    pub links_created: u64,
    /// Links consumed by protocols.
    pub links_consumed: u64,
    /// Individual attempts that failed.
    pub failed_attempts: u64,
    /// `create_link` calls that exhausted their budget.
    pub exhausted_budgets: u64,
}

fn pair_key(a: QubitRef, b: QubitRef) -> (QubitRef, QubitRef) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Creates and consumes entanglement links.
#[derive(Debug, Clone)]
pub struct EntanglementManager {
    model: Arc<dyn LinkModel>,
    links: FxHashMap<LinkId, EntanglementLink>,
    active: FxHashMap<(QubitRef, QubitRef), LinkId>,
    next_id: u64,
    stats: EntanglementStats,
}

impl Default for EntanglementManager {
    fn default() -> Self {
        Self::new(Arc::new(GaussianLinkModel::default()))
    }
}

impl EntanglementManager {
    /// Create a manager sampling through `model`.
    pub fn new(model: Arc<dyn LinkModel>) -> Self {
        Self {
            model,
            links: FxHashMap::default(),
            active: FxHashMap::default(),
            next_id: 0,
            stats: EntanglementStats::default(),
        }
    }

    /// The link model in use.
    pub fn model(&self) -> &dyn LinkModel {
        self.model.as_ref()
    }

    /// Try to entangle `a` and `b`, retrying up to `attempt_budget` times.
    ///
    /// Both slots are held under `lease` for the attempt sequence and the
    /// ones this call acquired are released afterwards, on success or
    /// failure. Every attempt costs one latency sample; the returned link's
    /// `latency` is their sum and it becomes available at `now + latency`.
    pub fn create_link<R: Rng + ?Sized>(
        &mut self,
        registry: &mut NodeRegistry,
        rng: &mut R,
        a: QubitRef,
        b: QubitRef,
        attempt_budget: u32,
        now: SimTime,
        lease: Lease,
    ) -> NetResult<EntanglementLink> {
        self.validate_pair(registry, a, b)?;

        let acquired = registry.acquire(&[a, b], lease)?;
        let result = self.attempt(registry, rng, a, b, attempt_budget, now);
        registry.release(&acquired, lease)?;
        result
    }

    fn validate_pair(&self, registry: &NodeRegistry, a: QubitRef, b: QubitRef) -> NetResult<()> {
        if a == b {
            return Err(NetError::InvalidOperand(format!(
                "cannot entangle {a} with itself"
            )));
        }
        registry.validate_ref(a)?;
        registry.validate_ref(b)?;
        if a.node == b.node {
            return Err(NetError::InvalidOperand(format!(
                "{a} and {b} are on the same node"
            )));
        }
        if !registry.connected(a.node, b.node) {
            return Err(NetError::InvalidOperand(format!(
                "no channel between {} and {}",
                a.node, b.node
            )));
        }
        if let Some(id) = self.active.get(&pair_key(a, b)) {
            return Err(NetError::InvalidLinkState {
                link: *id,
                reason: format!("an unconsumed link already joins {a} and {b}"),
            });
        }
        Ok(())
    }

    fn attempt<R: Rng + ?Sized>(
        &mut self,
        registry: &NodeRegistry,
        rng: &mut R,
        a: QubitRef,
        b: QubitRef,
        attempt_budget: u32,
        now: SimTime,
    ) -> NetResult<EntanglementLink> {
        let (noise_a, noise_b) = registry.noise_between(a.node, b.node)?;
        let p_success = self.model.success_probability(&noise_a, &noise_b);
        let latency = self.model.latency(&noise_a, &noise_b);

        let mut elapsed = 0.0;
        for attempt in 1..=attempt_budget {
            elapsed += latency.sample(rng);
            if rng.r#gen::<f64>() < p_success {
                let fidelity = self.model.fidelity(&noise_a, &noise_b).sample(rng);
                let link = EntanglementLink {
                    id: LinkId(self.next_id),
                    a,
                    b,
                    fidelity,
                    created_at: now + elapsed,
                    latency: elapsed,
                    attempts: attempt,
                    consumed: false,
                };
                self.next_id += 1;
                self.stats.links_created += 1;
                self.active.insert(pair_key(a, b), link.id);
                self.links.insert(link.id, link.clone());
                debug!(
                    link = %link.id,
                    %a,
                    %b,
                    attempts = attempt,
                    fidelity,
                    latency = elapsed,
                    "Entanglement link created"
                );
                return Ok(link);
            }
            self.stats.failed_attempts += 1;
            debug!(%a, %b, attempt, "Entanglement attempt failed");
        }

        self.stats.exhausted_budgets += 1;
        warn!(%a, %b, attempts = attempt_budget, "Entanglement budget exhausted");
        Err(NetError::EntanglementFailure {
            a,
            b,
            attempts: attempt_budget,
            elapsed,
        })
    }

    /// Mark a link consumed. A link can be consumed exactly once.
    pub fn consume_link(&mut self, id: LinkId) -> NetResult<&EntanglementLink> {
        let link = self.links.get_mut(&id).ok_or_else(|| NetError::InvalidLinkState {
            link: id,
            reason: "never created".into(),
        })?;
        if link.consumed {
            return Err(NetError::InvalidLinkState {
                link: id,
                reason: "already consumed".into(),
            });
        }
        link.consumed = true;
        self.active.remove(&pair_key(link.a, link.b));
        self.stats.links_consumed += 1;
        debug!(link = %id, "Entanglement link consumed");
        Ok(link)
    }

    /// Look up a link, consumed or not.
    pub fn get(&self, id: LinkId) -> Option<&EntanglementLink> {
        self.links.get(&id)
    }

    /// Unconsumed links, ordered by id.
    pub fn active_links(&self) -> Vec<&EntanglementLink> {
        let mut links: Vec<_> = self.links.values().filter(|l| !l.consumed).collect();
        links.sort_by_key(|l| l.id);
        links
    }

    /// Counters since creation.
    pub fn stats(&self) -> EntanglementStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::NoiseParams;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn setup(noise: NoiseParams) -> (NodeRegistry, EntanglementManager, StdRng) {
        (
            NodeRegistry::from_uniform(2, 3, noise).unwrap(),
            EntanglementManager::default(),
            StdRng::seed_from_u64(42),
        )
    }

    #[test]
    fn test_create_and_consume() {
        let (mut reg, mut mgr, mut rng) = setup(NoiseParams::noiseless(0.15));
        let a = QubitRef::new(0, 0);
        let b = QubitRef::new(1, 0);

        let link = mgr
            .create_link(&mut reg, &mut rng, a, b, 3, SimTime::ZERO, Lease(1))
            .unwrap();
        assert_eq!(link.attempts, 1);
        assert_eq!(link.latency, 0.15);
        assert_eq!(link.created_at, SimTime::new(0.15));
        assert!(reg.is_idle(a) && reg.is_idle(b));
        assert_eq!(mgr.active_links().len(), 1);

        assert!(mgr.consume_link(link.id).unwrap().consumed);
        let err = mgr.consume_link(link.id).unwrap_err();
        assert!(matches!(err, NetError::InvalidLinkState { .. }));
        assert!(mgr.active_links().is_empty());
        assert_eq!(mgr.stats().links_consumed, 1);
    }

    #[test]
    fn test_consume_unknown_link() {
        let (_, mut mgr, _) = setup(NoiseParams::default());
        assert!(matches!(
            mgr.consume_link(LinkId(99)),
            Err(NetError::InvalidLinkState { .. })
        ));
    }

    #[test]
    fn test_one_active_link_per_pair() {
        let (mut reg, mut mgr, mut rng) = setup(NoiseParams::noiseless(0.1));
        let a = QubitRef::new(0, 1);
        let b = QubitRef::new(1, 2);
        let link = mgr
            .create_link(&mut reg, &mut rng, a, b, 1, SimTime::ZERO, Lease(1))
            .unwrap();
        let err = mgr
            .create_link(&mut reg, &mut rng, b, a, 1, SimTime::ZERO, Lease(2))
            .unwrap_err();
        assert!(matches!(err, NetError::InvalidLinkState { link: id, .. } if id == link.id));

        mgr.consume_link(link.id).unwrap();
        assert!(
            mgr.create_link(&mut reg, &mut rng, a, b, 1, SimTime::ZERO, Lease(3))
                .is_ok()
        );
    }

    #[test]
    fn test_invalid_operands() {
        let (mut reg, mut mgr, mut rng) = setup(NoiseParams::default());
        let a = QubitRef::new(0, 0);
        for b in [a, QubitRef::new(0, 1), QubitRef::new(4, 0), QubitRef::new(1, 9)] {
            let err = mgr
                .create_link(&mut reg, &mut rng, a, b, 3, SimTime::ZERO, Lease(1))
                .unwrap_err();
            assert!(matches!(err, NetError::InvalidOperand(_)), "{b}: {err}");
        }
        assert!(reg.is_idle(a));
    }

    #[test]
    fn test_budget_exhaustion_releases_slots() {
        let noisy = NoiseParams {
            channel_noise: 1.0,
            ..NoiseParams::default()
        };
        let (mut reg, mut mgr, mut rng) = setup(noisy);
        let a = QubitRef::new(0, 0);
        let b = QubitRef::new(1, 0);
        let err = mgr
            .create_link(&mut reg, &mut rng, a, b, 4, SimTime::ZERO, Lease(1))
            .unwrap_err();
        match err {
            NetError::EntanglementFailure {
                attempts, elapsed, ..
            } => {
                assert_eq!(attempts, 4);
                assert!(elapsed >= 0.0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(reg.is_idle(a) && reg.is_idle(b));
        assert_eq!(mgr.stats().failed_attempts, 4);
        assert_eq!(mgr.stats().exhausted_budgets, 1);
    }

    #[test]
    fn test_zero_budget() {
        let (mut reg, mut mgr, mut rng) = setup(NoiseParams::noiseless(0.1));
        let err = mgr
            .create_link(
                &mut reg,
                &mut rng,
                QubitRef::new(0, 0),
                QubitRef::new(1, 0),
                0,
                SimTime::ZERO,
                Lease(1),
            )
            .unwrap_err();
        assert!(matches!(err, NetError::EntanglementFailure { attempts: 0, .. }));
    }

    #[test]
    fn test_held_slot_is_unavailable() {
        let (mut reg, mut mgr, mut rng) = setup(NoiseParams::noiseless(0.1));
        let a = QubitRef::new(0, 0);
        let b = QubitRef::new(1, 0);
        reg.acquire(&[a], Lease(9)).unwrap();

        let err = mgr
            .create_link(&mut reg, &mut rng, a, b, 1, SimTime::ZERO, Lease(1))
            .unwrap_err();
        assert!(matches!(err, NetError::ResourceUnavailable { .. }));

        // The holder itself may entangle, and keeps its slot afterwards.
        mgr.create_link(&mut reg, &mut rng, a, b, 1, SimTime::ZERO, Lease(9))
            .unwrap();
        assert_eq!(reg.holder(a), Some(Lease(9)));
        assert!(reg.is_idle(b));
    }
}
