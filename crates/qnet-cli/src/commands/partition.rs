//! Partition command implementation.

use anyhow::{Context, Result};
use console::style;

use qnet_compile::{PartitionPlan, PlannedOpKind};
use qnet_sim::{AlgorithmSpec, NetworkConfig, SimConfig, Simulation, algorithm_circuit};

/// Execute the partition command.
pub fn execute(
    algorithm: &str,
    qubits: u32,
    partitions: Option<usize>,
    nodes: u32,
    qubits_per_node: u32,
) -> Result<()> {
    let spec = AlgorithmSpec {
        kind: algorithm.parse()?,
        qubits,
    };

    let mut config = SimConfig::default();
    config.network = NetworkConfig::uniform(nodes, qubits_per_node);
    config.partition.partitions = partitions;
    let circuit = algorithm_circuit(&spec, config.workload.grover_iterations)?;

    println!(
        "{} Partitioning {} ({} qubits, {} gates) over {} nodes x {} qubits",
        style("→").cyan().bold(),
        style(circuit.name()).green(),
        circuit.num_qubits(),
        circuit.len(),
        nodes,
        qubits_per_node
    );

    let sim = Simulation::build_network(config)?;
    let plan = sim
        .plan(&circuit)
        .with_context(|| format!("Cannot partition {}", circuit.name()))?;
    print_plan(&plan);
    Ok(())
}

fn print_plan(plan: &PartitionPlan) {
    println!("\n{} Subcircuits:", style("✓").green().bold());
    for sub in &plan.subcircuits {
        let qubits: Vec<String> = sub
            .qubits
            .iter()
            .map(|(logical, slot)| format!("{logical}@{slot}"))
            .collect();
        println!(
            "  {}: [{}], {} entries",
            style(sub.node).cyan(),
            qubits.join(", "),
            sub.entries.len()
        );
    }

    let communication: Vec<_> = plan
        .operations
        .iter()
        .filter_map(|op| match &op.kind {
            PlannedOpKind::Communication { protocol, gate } => Some((op, protocol, gate)),
            PlannedOpKind::Local { .. } => None,
        })
        .collect();
    if !communication.is_empty() {
        println!("\n  Communication:");
        for (op, protocol, gate) in communication {
            let qubits: Vec<String> = op.qubits.iter().map(ToString::to_string).collect();
            println!(
                "  {:>5} {:<9} {:<4} {}",
                op.id.to_string(),
                protocol.to_string(),
                gate.name(),
                qubits.join(" -> ")
            );
        }
    }

    let stats = plan.stats;
    println!("\n  Partitions:             {}", stats.partitions);
    println!("  Local operations:       {}", stats.local_operation_count);
    println!("  Cross-node operations:  {}", stats.cross_node_operation_count);
    println!(
        "  Communication overhead: {:.1}%",
        stats.communication_overhead_ratio * 100.0
    );
}
