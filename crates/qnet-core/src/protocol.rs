//! Teleportation protocols as explicit state machines.
//!
//! Every protocol walks the same skeleton:
//!
//! ```text
//! Idle -> LinkRequested -> Linked -> ClassicalExchange -> Finalizing -> Complete
//!              |                            |
//!              +----------> Failed <--------+
//! ```
//!
//! What differs between kinds (classical payload size, the finalising step
//! and what the protocol achieves) is captured by a [`ProtocolHandler`].
//! The [`ProtocolEngine`] keeps one handler per [`ProtocolKind`] and drives
//! the skeleton, so callers dispatch on the kind alone.

use qnet_ir::GateKind;
use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::entanglement::LinkId;
use crate::error::{NetError, NetResult};
use crate::network::Network;
use crate::noise::check_probability;
use crate::registry::NodeRegistry;
use crate::types::{Lease, QubitRef, SimTime};

/// Communication protocols the engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// Teleport a qubit's state to another node.
    TeleData,
    /// Apply a two-qubit gate across nodes.
    TeleGate,
}

impl ProtocolKind {
    /// Lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolKind::TeleData => "teledata",
            ProtocolKind::TeleGate => "telegate",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ProtocolKind {
    type Err = NetError;

    fn from_str(s: &str) -> NetResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "teledata" | "teleport" => Ok(ProtocolKind::TeleData),
            "telegate" | "remote_gate" => Ok(ProtocolKind::TeleGate),
            other => Err(NetError::UnknownProtocol(other.to_string())),
        }
    }
}

/// Protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolState {
    /// Not started.
    Idle,
    /// Waiting on the entanglement manager.
    LinkRequested,
    /// A link is available.
    Linked,
    /// Local measurement and classical message in flight.
    ClassicalExchange,
    /// Applying corrections or the remote gate.
    Finalizing,
    /// Finished successfully.
    Complete,
    /// Finished unsuccessfully.
    Failed,
}

impl ProtocolState {
    /// Whether no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProtocolState::Complete | ProtocolState::Failed)
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A state entered at a simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// State entered.
    pub state: ProtocolState,
    /// When it was entered.
    pub at: SimTime,
}

/// Timing and fidelity constants of the protocols and local gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Seconds for a local Bell-basis measurement.
    #[serde(default = "default_measurement_latency")]
    pub measurement_latency: f64,
    /// Seconds to send a classical message of `classical_reference_bits`.
    #[serde(default = "default_classical_latency")]
    pub classical_latency: f64,
    /// Message size the classical latency is quoted for.
    #[serde(default = "default_classical_reference_bits")]
    pub classical_reference_bits: u32,
    /// Seconds to apply the teleportation corrections.
    #[serde(default = "default_correction_latency")]
    pub correction_latency: f64,
    /// Fidelity factor of the corrections.
    #[serde(default = "default_correction_fidelity")]
    pub correction_fidelity: f64,
    /// Classical bits a TeleGate sends.
    #[serde(default = "default_telegate_payload_bits")]
    pub telegate_payload_bits: u32,
    /// Seconds of local operations completing a remote gate.
    #[serde(default = "default_gate_latency")]
    pub gate_latency: f64,
    /// Fidelity factor of a remote gate.
    #[serde(default = "default_gate_fidelity")]
    pub gate_fidelity: f64,
    /// Seconds per local single-qubit gate.
    #[serde(default = "default_single_qubit_gate_time")]
    pub single_qubit_gate_time: f64,
    /// Seconds per local two-qubit gate.
    #[serde(default = "default_two_qubit_gate_time")]
    pub two_qubit_gate_time: f64,
    /// Fidelity of a local single-qubit gate.
    #[serde(default = "default_single_qubit_fidelity")]
    pub single_qubit_fidelity: f64,
    /// Fidelity of a local two-qubit gate.
    #[serde(default = "default_two_qubit_fidelity")]
    pub two_qubit_fidelity: f64,
}

fn default_measurement_latency() -> f64 {
    0.05
}
fn default_classical_latency() -> f64 {
    0.1
}
fn default_classical_reference_bits() -> u32 {
    2
}
fn default_correction_latency() -> f64 {
    0.02
}
fn default_correction_fidelity() -> f64 {
    0.99
}
fn default_telegate_payload_bits() -> u32 {
    1
}
fn default_gate_latency() -> f64 {
    0.08
}
fn default_gate_fidelity() -> f64 {
    0.98
}
fn default_single_qubit_gate_time() -> f64 {
    0.01
}
fn default_two_qubit_gate_time() -> f64 {
    0.02
}
fn default_single_qubit_fidelity() -> f64 {
    0.999
}
fn default_two_qubit_fidelity() -> f64 {
    0.99
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            measurement_latency: default_measurement_latency(),
            classical_latency: default_classical_latency(),
            classical_reference_bits: default_classical_reference_bits(),
            correction_latency: default_correction_latency(),
            correction_fidelity: default_correction_fidelity(),
            telegate_payload_bits: default_telegate_payload_bits(),
            gate_latency: default_gate_latency(),
            gate_fidelity: default_gate_fidelity(),
            single_qubit_gate_time: default_single_qubit_gate_time(),
            two_qubit_gate_time: default_two_qubit_gate_time(),
            single_qubit_fidelity: default_single_qubit_fidelity(),
            two_qubit_fidelity: default_two_qubit_fidelity(),
        }
    }
}

impl ProtocolConfig {
    /// Seconds to send `bits` classical bits; scales linearly.
    pub fn classical_latency_for(&self, bits: u32) -> f64 {
        self.classical_latency * f64::from(bits) / f64::from(self.classical_reference_bits.max(1))
    }

    /// Check every latency is non-negative and every fidelity a probability.
    pub fn validate(&self) -> NetResult<()> {
        for (name, value) in [
            ("measurement_latency", self.measurement_latency),
            ("classical_latency", self.classical_latency),
            ("correction_latency", self.correction_latency),
            ("gate_latency", self.gate_latency),
            ("single_qubit_gate_time", self.single_qubit_gate_time),
            ("two_qubit_gate_time", self.two_qubit_gate_time),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(NetError::InvalidConfig(format!(
                    "{name} must be a non-negative number of seconds, got {value}"
                )));
            }
        }
        check_probability("correction_fidelity", self.correction_fidelity)?;
        check_probability("gate_fidelity", self.gate_fidelity)?;
        check_probability("single_qubit_fidelity", self.single_qubit_fidelity)?;
        check_probability("two_qubit_fidelity", self.two_qubit_fidelity)?;
        if self.classical_reference_bits == 0 {
            return Err(NetError::InvalidConfig(
                "classical_reference_bits must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Pauli corrections decided by the teleportation measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corrections {
    /// Apply X.
    pub x: bool,
    /// Apply Z.
    pub z: bool,
}

/// What a completed protocol achieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SideEffect {
    /// The source state now lives at the target.
    StateTransferred {
        /// Where the state came from.
        from: QubitRef,
        /// Where it lives now.
        to: QubitRef,
        /// Corrections applied at the target.
        corrections: Corrections,
    },
    /// A two-qubit gate acted across nodes.
    GateApplied {
        /// Control qubit.
        control: QubitRef,
        /// Target qubit.
        target: QubitRef,
        /// The gate.
        gate: GateKind,
    },
}

/// A request to run one protocol instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolRequest {
    /// Which protocol.
    pub kind: ProtocolKind,
    /// Source (TeleData) or control (TeleGate).
    pub source: QubitRef,
    /// Destination (TeleData) or target (TeleGate).
    pub target: QubitRef,
    /// Gate to apply remotely; TeleGate defaults to CX.
    pub gate: Option<GateKind>,
}

impl ProtocolRequest {
    /// Teleport `source` to `target`.
    pub fn teledata(source: QubitRef, target: QubitRef) -> Self {
        Self {
            kind: ProtocolKind::TeleData,
            source,
            target,
            gate: None,
        }
    }

    /// Apply `gate` with `control` and `target` on different nodes.
    pub fn telegate(control: QubitRef, target: QubitRef, gate: GateKind) -> Self {
        Self {
            kind: ProtocolKind::TeleGate,
            source: control,
            target,
            gate: Some(gate),
        }
    }
}

/// Where the time of a protocol went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyBreakdown {
    /// Link generation, failed attempts included.
    pub entanglement: f64,
    /// Local measurement.
    pub measurement: f64,
    /// Classical message.
    pub classical: f64,
    /// Corrections or remote gate.
    pub finalize: f64,
}

impl LatencyBreakdown {
    /// Total seconds.
    pub fn total(&self) -> f64 {
        self.entanglement + self.measurement + self.classical + self.finalize
    }
}

/// Result of a protocol that reached `Complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolOutcome {
    /// Protocol that ran.
    pub kind: ProtocolKind,
    /// Final fidelity: link fidelity times the finalising factor.
    pub fidelity: f64,
    /// Fidelity of the consumed link.
    pub link_fidelity: f64,
    /// Timing.
    pub latency: LatencyBreakdown,
    /// Consumed link.
    pub link: LinkId,
    /// Link-generation attempts.
    pub attempts: u32,
    /// What was achieved.
    pub effect: SideEffect,
    /// States entered, in order.
    pub trace: Vec<Transition>,
}

impl ProtocolOutcome {
    /// Total elapsed seconds.
    pub fn total_latency(&self) -> f64 {
        self.latency.total()
    }
}

/// Result of a protocol that reached `Failed`.
#[derive(Debug, Clone, Error)]
#[error("{kind} failed after {elapsed:.4}s: {error}")]
pub struct ProtocolFailure {
    /// Protocol that ran.
    pub kind: ProtocolKind,
    /// Why it failed.
    #[source]
    pub error: NetError,
    /// Seconds spent before failing.
    pub elapsed: f64,
    /// Link-generation attempts made.
    pub attempts: u32,
    /// States entered, in order.
    pub trace: Vec<Transition>,
}

/// Result of a local gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalOutcome {
    /// Seconds taken.
    pub latency: f64,
    /// Fidelity in `[0, 1]`.
    pub fidelity: f64,
}

/// Kind-specific behaviour plugged into the shared protocol skeleton.
pub trait ProtocolHandler: Send + Sync + fmt::Debug {
    /// Kind this handler serves.
    fn kind(&self) -> ProtocolKind;

    /// Classical bits sent during the exchange.
    fn payload_bits(&self, config: &ProtocolConfig) -> u32;

    /// Seconds spent in `Finalizing`.
    fn finalize_latency(&self, config: &ProtocolConfig) -> f64;

    /// Factor applied to the link fidelity.
    fn finalize_fidelity(&self, config: &ProtocolConfig) -> f64;

    /// What completion achieves, given the measured bits.
    fn side_effect(&self, request: &ProtocolRequest, bits: &[bool]) -> SideEffect;
}

/// State teleportation: two measured bits select the Pauli corrections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeleDataHandler;

impl ProtocolHandler for TeleDataHandler {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::TeleData
    }

    fn payload_bits(&self, _config: &ProtocolConfig) -> u32 {
        2
    }

    fn finalize_latency(&self, config: &ProtocolConfig) -> f64 {
        config.correction_latency
    }

    fn finalize_fidelity(&self, config: &ProtocolConfig) -> f64 {
        config.correction_fidelity
    }

    fn side_effect(&self, request: &ProtocolRequest, bits: &[bool]) -> SideEffect {
        SideEffect::StateTransferred {
            from: request.source,
            to: request.target,
            corrections: Corrections {
                z: bits.first().copied().unwrap_or(false),
                x: bits.get(1).copied().unwrap_or(false),
            },
        }
    }
}

/// Remote gate through a shared link and a lighter classical message.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeleGateHandler;

impl ProtocolHandler for TeleGateHandler {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::TeleGate
    }

    fn payload_bits(&self, config: &ProtocolConfig) -> u32 {
        config.telegate_payload_bits
    }

    fn finalize_latency(&self, config: &ProtocolConfig) -> f64 {
        config.gate_latency
    }

    fn finalize_fidelity(&self, config: &ProtocolConfig) -> f64 {
        config.gate_fidelity
    }

    fn side_effect(&self, request: &ProtocolRequest, _bits: &[bool]) -> SideEffect {
        SideEffect::GateApplied {
            control: request.source,
            target: request.target,
            gate: request.gate.clone().unwrap_or(GateKind::CX),
        }
    }
}

/// Runs protocols by dispatching on their kind.
#[derive(Debug)]
pub struct ProtocolEngine {
    config: ProtocolConfig,
    handlers: FxHashMap<ProtocolKind, Box<dyn ProtocolHandler>>,
}

impl Default for ProtocolEngine {
    fn default() -> Self {
        Self::new(ProtocolConfig::default())
    }
}

impl ProtocolEngine {
    /// Engine with the built-in TeleData and TeleGate handlers.
    pub fn new(config: ProtocolConfig) -> Self {
        let mut engine = Self {
            config,
            handlers: FxHashMap::default(),
        };
        engine.register(Box::new(TeleDataHandler));
        engine.register(Box::new(TeleGateHandler));
        engine
    }

    /// Register a handler, replacing any previous one for its kind.
    pub fn register(&mut self, handler: Box<dyn ProtocolHandler>) -> Option<Box<dyn ProtocolHandler>> {
        let kind = handler.kind();
        debug!(%kind, "Registering protocol handler");
        self.handlers.insert(kind, handler)
    }

    /// Handler for a kind.
    pub fn handler(&self, kind: ProtocolKind) -> NetResult<&dyn ProtocolHandler> {
        self.handlers
            .get(&kind)
            .map(|handler| &**handler)
            .ok_or_else(|| NetError::UnknownProtocol(kind.to_string()))
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<ProtocolKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Timing and fidelity constants.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Run one protocol instance starting at `now`.
    ///
    /// The request's slots are expected to be held under `lease` by the
    /// caller; the entanglement manager accepts them as re-entrant. On
    /// failure no link is left unconsumed by this call except when the
    /// classical exchange itself fails.
    pub fn execute(
        &self,
        network: &mut Network,
        request: &ProtocolRequest,
        attempt_budget: u32,
        now: SimTime,
        lease: Lease,
    ) -> Result<ProtocolOutcome, ProtocolFailure> {
        let mut trace = vec![Transition {
            state: ProtocolState::Idle,
            at: now,
        }];
        let fail = |error: NetError, elapsed: f64, attempts: u32, mut trace: Vec<Transition>| {
            trace.push(Transition {
                state: ProtocolState::Failed,
                at: now + elapsed,
            });
            warn!(kind = %request.kind, %error, elapsed, "Protocol failed");
            ProtocolFailure {
                kind: request.kind,
                error,
                elapsed,
                attempts,
                trace,
            }
        };

        let handler = match self.handler(request.kind) {
            Ok(handler) => handler,
            Err(error) => {
                return Err(ProtocolFailure {
                    kind: request.kind,
                    error,
                    elapsed: 0.0,
                    attempts: 0,
                    trace,
                });
            }
        };

        trace.push(Transition {
            state: ProtocolState::LinkRequested,
            at: now,
        });
        let link = match network.create_link(request.source, request.target, attempt_budget, now, lease)
        {
            Ok(link) => link,
            Err(error) => {
                let (elapsed, attempts) = match &error {
                    NetError::EntanglementFailure {
                        elapsed, attempts, ..
                    } => (*elapsed, *attempts),
                    _ => (0.0, 0),
                };
                return Err(fail(error, elapsed, attempts, trace));
            }
        };

        let linked_at = now + link.latency;
        trace.push(Transition {
            state: ProtocolState::Linked,
            at: linked_at,
        });
        trace.push(Transition {
            state: ProtocolState::ClassicalExchange,
            at: linked_at,
        });

        let payload = handler.payload_bits(&self.config);
        let bits: Vec<bool> = (0..payload).map(|_| network.rng.r#gen::<bool>()).collect();
        let measurement = self.config.measurement_latency;
        let classical = self.config.classical_latency_for(payload);

        if let Err(error) = network.entanglement.consume_link(link.id) {
            return Err(fail(
                error,
                link.latency + measurement + classical,
                link.attempts,
                trace,
            ));
        }

        let finalizing_at = linked_at + (measurement + classical);
        trace.push(Transition {
            state: ProtocolState::Finalizing,
            at: finalizing_at,
        });

        let finalize = handler.finalize_latency(&self.config);
        let fidelity = (link.fidelity * handler.finalize_fidelity(&self.config)).clamp(0.0, 1.0);
        let latency = LatencyBreakdown {
            entanglement: link.latency,
            measurement,
            classical,
            finalize,
        };
        trace.push(Transition {
            state: ProtocolState::Complete,
            at: now + latency.total(),
        });

        info!(
            kind = %request.kind,
            source = %request.source,
            target = %request.target,
            fidelity,
            latency = latency.total(),
            attempts = link.attempts,
            "Protocol complete"
        );

        Ok(ProtocolOutcome {
            kind: request.kind,
            fidelity,
            link_fidelity: link.fidelity,
            latency,
            link: link.id,
            attempts: link.attempts,
            effect: handler.side_effect(request, &bits),
            trace,
        })
    }

    /// Cost of a gate whose operands all live on one node.
    ///
    /// Cost follows the number of operands given, which may be fewer than
    /// the gate's arity when the rest of a multi-qubit gate was brought in
    /// by communication operations.
    pub fn execute_local(
        &self,
        registry: &NodeRegistry,
        gate: &GateKind,
        qubits: &[QubitRef],
    ) -> NetResult<LocalOutcome> {
        let Some(first) = qubits.first() else {
            return Err(NetError::InvalidOperand(format!("{gate} has no operands")));
        };
        if qubits.len() > gate.num_qubits() as usize {
            return Err(NetError::InvalidOperand(format!(
                "{gate} takes {} operands, got {}",
                gate.num_qubits(),
                qubits.len()
            )));
        }
        for (i, q) in qubits.iter().enumerate() {
            registry.validate_ref(*q)?;
            if q.node != first.node {
                return Err(NetError::InvalidOperand(format!(
                    "local {gate} spans {} and {}",
                    first.node, q.node
                )));
            }
            if qubits[..i].contains(q) {
                return Err(NetError::InvalidOperand(format!("{q} repeated in {gate}")));
            }
        }

        let loss = registry
            .node(first.node)
            .map(|n| n.noise().fidelity_loss_rate)
            .unwrap_or(0.0);
        let extra = (qubits.len() - 1) as i32;
        let (latency, gate_fidelity) = match gate {
            GateKind::Measure => (self.config.measurement_latency, self.config.single_qubit_fidelity),
            _ if extra == 0 => (
                self.config.single_qubit_gate_time,
                self.config.single_qubit_fidelity,
            ),
            _ => (
                self.config.two_qubit_gate_time * f64::from(extra),
                self.config.two_qubit_fidelity.powi(extra),
            ),
        };

        Ok(LocalOutcome {
            latency,
            fidelity: (gate_fidelity * (1.0 - loss)).clamp(0.0, 1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::{GaussianLinkModel, NoiseParams};
    use std::sync::Arc;

    fn network(noise: NoiseParams) -> Network {
        let registry = NodeRegistry::from_uniform(2, 3, noise).unwrap();
        Network::new(registry, Arc::new(GaussianLinkModel::default()), Some(42))
    }

    fn states(trace: &[Transition]) -> Vec<ProtocolState> {
        trace.iter().map(|t| t.state).collect()
    }

    #[test]
    fn test_teledata_noiseless() {
        let engine = ProtocolEngine::default();
        let mut net = network(NoiseParams::noiseless(0.15));
        let req = ProtocolRequest::teledata(QubitRef::new(0, 0), QubitRef::new(1, 0));

        let out = engine.execute(&mut net, &req, 3, SimTime::ZERO, Lease(1)).unwrap();
        assert_eq!(
            states(&out.trace),
            vec![
                ProtocolState::Idle,
                ProtocolState::LinkRequested,
                ProtocolState::Linked,
                ProtocolState::ClassicalExchange,
                ProtocolState::Finalizing,
                ProtocolState::Complete,
            ]
        );
        assert_eq!(out.latency.entanglement, 0.15);
        assert!((out.total_latency() - 0.32).abs() < 1e-9);
        assert!((out.fidelity - 0.985 * 0.99).abs() < 1e-12);
        assert!(matches!(out.effect, SideEffect::StateTransferred { .. }));
        assert!(net.entanglement().active_links().is_empty());
    }

    #[test]
    fn test_telegate_lighter_exchange() {
        let engine = ProtocolEngine::default();
        let mut net = network(NoiseParams::noiseless(0.15));
        let req = ProtocolRequest::telegate(QubitRef::new(0, 1), QubitRef::new(1, 2), GateKind::CZ);

        let out = engine.execute(&mut net, &req, 3, SimTime::ZERO, Lease(1)).unwrap();
        assert!((out.latency.classical - 0.05).abs() < 1e-12);
        assert!((out.fidelity - 0.985 * 0.98).abs() < 1e-12);
        match out.effect {
            SideEffect::GateApplied { gate, control, .. } => {
                assert_eq!(gate, GateKind::CZ);
                assert_eq!(control, QubitRef::new(0, 1));
            }
            other => panic!("unexpected effect: {other:?}"),
        }
    }

    #[test]
    fn test_entanglement_failure_is_reported() {
        let engine = ProtocolEngine::default();
        let mut net = network(NoiseParams {
            channel_noise: 1.0,
            ..NoiseParams::default()
        });
        let req = ProtocolRequest::teledata(QubitRef::new(0, 0), QubitRef::new(1, 0));

        let failure = engine
            .execute(&mut net, &req, 2, SimTime::ZERO, Lease(1))
            .unwrap_err();
        assert!(matches!(failure.error, NetError::EntanglementFailure { attempts: 2, .. }));
        assert_eq!(
            states(&failure.trace),
            vec![
                ProtocolState::Idle,
                ProtocolState::LinkRequested,
                ProtocolState::Failed
            ]
        );
        assert!(net.registry().is_idle(QubitRef::new(0, 0)));
    }

    #[test]
    fn test_invalid_operand_fails_from_link_request() {
        let engine = ProtocolEngine::default();
        let mut net = network(NoiseParams::default());
        let same = QubitRef::new(0, 0);
        let failure = engine
            .execute(
                &mut net,
                &ProtocolRequest::teledata(same, same),
                3,
                SimTime::ZERO,
                Lease(1),
            )
            .unwrap_err();
        assert!(matches!(failure.error, NetError::InvalidOperand(_)));
        assert_eq!(failure.trace.last().map(|t| t.state), Some(ProtocolState::Failed));
    }

    #[test]
    fn test_registry_dispatch() {
        let engine = ProtocolEngine::default();
        assert_eq!(
            engine.kinds(),
            vec![ProtocolKind::TeleData, ProtocolKind::TeleGate]
        );
        assert_eq!(
            engine.handler(ProtocolKind::TeleGate).unwrap().payload_bits(engine.config()),
            1
        );
        assert_eq!("teleport".parse::<ProtocolKind>().unwrap(), ProtocolKind::TeleData);
        assert!("swap".parse::<ProtocolKind>().is_err());
    }

    #[test]
    fn test_classical_latency_scales() {
        let config = ProtocolConfig::default();
        assert!((config.classical_latency_for(2) - 0.1).abs() < 1e-12);
        assert!((config.classical_latency_for(1) - 0.05).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_local_execution() {
        let engine = ProtocolEngine::default();
        let registry = NodeRegistry::from_uniform(2, 3, NoiseParams::default()).unwrap();

        let one = engine
            .execute_local(&registry, &GateKind::H, &[QubitRef::new(0, 0)])
            .unwrap();
        assert_eq!(one.latency, 0.01);
        assert!((one.fidelity - 0.999 * 0.99).abs() < 1e-12);

        let two = engine
            .execute_local(
                &registry,
                &GateKind::CX,
                &[QubitRef::new(1, 0), QubitRef::new(1, 2)],
            )
            .unwrap();
        assert_eq!(two.latency, 0.02);

        let err = engine
            .execute_local(
                &registry,
                &GateKind::CX,
                &[QubitRef::new(0, 0), QubitRef::new(1, 0)],
            )
            .unwrap_err();
        assert!(matches!(err, NetError::InvalidOperand(_)));
    }
}
