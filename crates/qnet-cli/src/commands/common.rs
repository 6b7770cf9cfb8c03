//! Shared helpers for CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use qnet_sim::{SimConfig, Simulation, SimulationMetrics};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    /// Parse a `--format` value.
    pub fn parse(format: &str) -> Result<Self> {
        match format.to_lowercase().as_str() {
            "table" | "text" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("Unknown format: '{other}'. Available: table, json"),
        }
    }
}

/// Load a configuration file, or the defaults, then apply environment
/// overrides.
pub fn load_config(path: Option<&str>) -> Result<SimConfig> {
    let mut config = match path {
        Some(path) => {
            if !Path::new(path).exists() {
                anyhow::bail!("File not found: {path}");
            }
            SimConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration: {path}"))?
        }
        None => SimConfig::default(),
    };
    config
        .merge_env()
        .context("Invalid QNET_* environment override")?;
    Ok(config)
}

/// Short name for a configuration file.
pub fn config_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Build the network, submit both workloads and run to completion.
pub fn simulate(config: SimConfig) -> Result<Simulation> {
    let mut sim = Simulation::build_network(config).context("Failed to build network")?;
    sim.submit_protocol_workload()
        .context("Failed to submit protocol workload")?;
    sim.submit_algorithm_workload()
        .context("Failed to submit algorithm workload")?;
    sim.run_until_idle().context("Simulation did not drain")?;
    Ok(sim)
}

/// Print metrics as an aligned table.
pub fn print_metrics(metrics: &SimulationMetrics) {
    println!("\n{} Metrics:", style("✓").green().bold());
    println!(
        "  Operations:            {} ({} completed, {} failed, {} cancelled)",
        metrics.total_operations, metrics.completed, metrics.failed, metrics.cancelled
    );
    println!("  Avg latency:           {:.4} s", metrics.latency);
    println!(
        "  Avg fidelity:          {:.4} (min {:.4})",
        metrics.fidelity, metrics.min_fidelity
    );
    println!("  Throughput:            {:.3} ops/s", metrics.throughput);
    println!(
        "  Communication overhead: {:.1}%",
        metrics.communication_overhead_ratio * 100.0
    );
    println!(
        "  Scheduling efficiency: {:.1}%",
        metrics.scheduling_efficiency * 100.0
    );
    println!(
        "  Links created:         {} ({} failed attempts)",
        metrics.links_created, metrics.failed_attempts
    );
    println!("  Horizon:               {:.4} s", metrics.horizon);

    for (node, busy) in metrics.node_busy_time.iter().enumerate() {
        println!("    n{node} busy {busy:.4} s");
    }

    let flags = metrics.bottlenecks;
    if flags.any() {
        println!("\n{} Bottlenecks:", style("!").yellow().bold());
        if flags.high_communication_latency {
            println!("  - high communication latency");
        }
        if flags.low_fidelity {
            println!("  - low fidelity");
        }
        if flags.high_resource_usage {
            println!("  - high resource usage");
        }
    }
}
