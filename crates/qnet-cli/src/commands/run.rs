//! Run command implementation.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::common::{OutputFormat, load_config, print_metrics, simulate};

/// Execute the run command.
pub async fn execute(
    config_path: Option<&str>,
    seed: Option<u64>,
    format: &str,
    output: Option<&str>,
) -> Result<()> {
    let format = OutputFormat::parse(format)?;
    let mut config = load_config(config_path)?;
    if seed.is_some() {
        config.network.seed = seed;
    }

    if format == OutputFormat::Table {
        println!(
            "{} Simulating {} nodes ({} qubits), seed {}",
            style("→").cyan().bold(),
            style(config.network.nodes).green(),
            style(config.network.capacities().iter().sum::<u32>()).green(),
            config
                .network
                .seed
                .map_or_else(|| "random".to_string(), |s| s.to_string())
        );
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Running schedule...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let sim = tokio::task::spawn_blocking(move || simulate(config))
        .await
        .context("Simulation task panicked")??;
    spinner.finish_and_clear();

    let report = sim.report()?;
    if let Some(path) = output {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report: {path}"))?;
    }

    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Table => {
            println!("  Run: {}", style(report.run_id).dim());
            println!("\n  Submissions:");
            for handle in &report.handles {
                let marker = if handle.succeeded() {
                    style("✓").green()
                } else {
                    style("✗").red()
                };
                println!(
                    "  {} {:<14} {:>3}/{:<3} ops  fidelity {}",
                    marker,
                    handle.name,
                    handle.completed,
                    handle.operations,
                    handle
                        .fidelity
                        .map_or_else(|| "-".to_string(), |f| format!("{f:.4}"))
                );
            }
            print_metrics(&report.metrics);
            if let Some(path) = output {
                println!("\n  Report written to {}", style(path).green());
            }
        }
    }
    Ok(())
}
