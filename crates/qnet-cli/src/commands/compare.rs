//! Compare command implementation.
//!
//! Each configuration runs in its own blocking task; results are ranked
//! once all of them finish.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinSet;
use tracing::info;

use qnet_sim::{SimulationMetrics, compare_configurations};

use super::common::{OutputFormat, config_name, load_config, simulate};

/// Execute the compare command.
pub async fn execute(paths: &[String], format: &str) -> Result<()> {
    let format = OutputFormat::parse(format)?;
    if paths.len() < 2 {
        anyhow::bail!("compare needs at least two configurations");
    }

    let mut tasks = JoinSet::new();
    for (index, path) in paths.iter().enumerate() {
        let config = load_config(Some(path))?;
        let name = config_name(path);
        tasks.spawn_blocking(move || -> Result<(usize, String, SimulationMetrics)> {
            let sim = simulate(config).with_context(|| format!("Configuration {name} failed"))?;
            Ok((index, name, sim.get_metrics()))
        });
    }

    let progress = ProgressBar::new(paths.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut results = Vec::with_capacity(paths.len());
    while let Some(joined) = tasks.join_next().await {
        let (index, name, metrics) = joined.context("Simulation task panicked")??;
        info!(config = %name, fidelity = metrics.fidelity, "Configuration finished");
        progress.set_message(name.clone());
        progress.inc(1);
        results.push((index, name, metrics));
    }
    progress.finish_and_clear();
    results.sort_by_key(|(index, _, _)| *index);

    let comparison =
        compare_configurations(results.iter().map(|(_, name, m)| (name.as_str(), m)));

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&comparison)?),
        OutputFormat::Table => {
            println!(
                "\n  {:<16} {:>10} {:>10} {:>10} {:>10} {:>6}",
                "config", "latency", "fidelity", "ops/s", "sched", "ops"
            );
            for entry in &comparison.entries {
                println!(
                    "  {:<16} {:>10.4} {:>10.4} {:>10.3} {:>9.1}% {:>6}",
                    entry.name,
                    entry.avg_latency,
                    entry.avg_fidelity,
                    entry.throughput,
                    entry.scheduling_efficiency * 100.0,
                    entry.total_operations
                );
            }
            println!("\n{} Ranking:", style("✓").green().bold());
            for (rank, name) in comparison.ranking.iter().enumerate() {
                println!("  {}. {}", rank + 1, style(name).cyan());
            }
        }
    }
    Ok(())
}
