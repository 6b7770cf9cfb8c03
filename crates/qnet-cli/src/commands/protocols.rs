//! Protocols command implementation.

use anyhow::{Context, Result};
use console::style;

use qnet_sim::{NetworkConfig, SimConfig, Simulation};

use super::common::print_metrics;

/// Execute the protocols command.
pub async fn execute(nodes: u32, qubits: u32, operations: usize, seed: u64) -> Result<()> {
    let mut config = SimConfig::default();
    config.network = NetworkConfig::uniform(nodes, qubits);
    config.network.seed = Some(seed);
    config.workload.operations = operations;
    config.workload.algorithms.clear();

    println!(
        "{} {} teleportations on {} nodes x {} qubits",
        style("→").cyan().bold(),
        style(operations).green(),
        style(nodes).green(),
        style(qubits).green()
    );

    let sim = tokio::task::spawn_blocking(move || -> Result<Simulation> {
        let mut sim = Simulation::build_network(config).context("Failed to build network")?;
        sim.submit_protocol_workload()?;
        sim.run_until_idle()?;
        Ok(sim)
    })
    .await
    .context("Simulation task panicked")??;

    print_metrics(&sim.get_metrics());
    Ok(())
}
