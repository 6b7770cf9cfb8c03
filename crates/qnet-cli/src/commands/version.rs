//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - distributed quantum network simulator",
        style("qnet").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qnet-ir       Logical circuits and algorithm library");
    println!("  qnet-core     Node registry, entanglement and protocols");
    println!("  qnet-compile  Circuit partitioner");
    println!("  qnet-sched    Discrete-event scheduler and ledger");
    println!("  qnet-sim      Simulation driver, workloads and metrics");
    println!("  qnet-cli      Command-line interface");
    println!();
    println!("License: {}", style(env!("CARGO_PKG_LICENSE")).dim());
}
