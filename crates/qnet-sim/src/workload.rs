//! Workload generation.

use qnet_core::{NodeId, NodeRegistry, QubitRef};
use qnet_ir::{Circuit, GateKind};
use qnet_sched::OperationRequest;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::{AlgorithmKind, AlgorithmSpec, WorkloadConfig};
use crate::error::{SimError, SimResult};

/// Random teleportations followed by remote CNOTs.
///
/// Each operation picks a random node, a random neighbour of it, and a
/// random slot on both. The number of remote gates is
/// `operations * remote_gate_share`, rounded down.
pub fn protocol_workload<R: Rng + ?Sized>(
    registry: &NodeRegistry,
    operations: usize,
    remote_gate_share: f64,
    rng: &mut R,
) -> SimResult<Vec<OperationRequest>> {
    let pairs = connected_pairs(registry);
    if pairs.is_empty() && operations > 0 {
        return Err(SimError::Config(
            "protocol workload needs at least two connected nodes".into(),
        ));
    }

    let remote_gates = (operations as f64 * remote_gate_share.clamp(0.0, 1.0)).floor() as usize;
    let mut requests = Vec::with_capacity(operations + remote_gates);

    for i in 0..operations {
        let (source, target) = random_endpoints(registry, &pairs, rng)?;
        requests.push(OperationRequest::teleport(source, target).with_label(format!("teledata-{i}")));
    }
    for i in 0..remote_gates {
        let (control, target) = random_endpoints(registry, &pairs, rng)?;
        requests.push(
            OperationRequest::remote_gate(GateKind::CX, control, target)
                .with_label(format!("telegate-{i}")),
        );
    }
    Ok(requests)
}

/// Algorithm circuits named by the workload.
pub fn algorithm_circuits(config: &WorkloadConfig) -> SimResult<Vec<Circuit>> {
    config
        .algorithms
        .iter()
        .map(|spec| algorithm_circuit(spec, config.grover_iterations))
        .collect()
}

/// Build one algorithm circuit. Grover marks the all-ones state.
pub fn algorithm_circuit(spec: &AlgorithmSpec, grover_iterations: u32) -> SimResult<Circuit> {
    let circuit = match spec.kind {
        AlgorithmKind::Ghz => Circuit::ghz(spec.qubits)?,
        AlgorithmKind::Qft => Circuit::qft(spec.qubits)?,
        AlgorithmKind::Grover => {
            if spec.qubits == 0 || spec.qubits > 63 {
                return Err(SimError::Config(format!(
                    "grover needs 1 to 63 qubits, got {}",
                    spec.qubits
                )));
            }
            let marked = (1_u64 << spec.qubits) - 1;
            Circuit::grover(spec.qubits, &[marked], grover_iterations)?
        }
    };
    Ok(circuit)
}

fn connected_pairs(registry: &NodeRegistry) -> Vec<(NodeId, NodeId)> {
    let mut pairs = Vec::new();
    for node in registry.nodes() {
        for neighbour in registry.neighbours(node.id()) {
            pairs.push((node.id(), neighbour));
        }
    }
    pairs
}

fn random_endpoints<R: Rng + ?Sized>(
    registry: &NodeRegistry,
    pairs: &[(NodeId, NodeId)],
    rng: &mut R,
) -> SimResult<(QubitRef, QubitRef)> {
    let &(a, b) = pairs
        .choose(rng)
        .ok_or_else(|| SimError::Config("no connected node pair".into()))?;
    Ok((random_slot(registry, a, rng)?, random_slot(registry, b, rng)?))
}

fn random_slot<R: Rng + ?Sized>(
    registry: &NodeRegistry,
    node: NodeId,
    rng: &mut R,
) -> SimResult<QubitRef> {
    let capacity = registry
        .node(node)
        .map(|n| n.capacity())
        .ok_or_else(|| SimError::Config(format!("unknown node {node}")))?;
    Ok(QubitRef::new(node, rng.gen_range(0..capacity)))
}
