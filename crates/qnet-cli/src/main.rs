//! qnet Command-Line Interface
//!
//! The main entry point for the qnet distributed quantum network simulator.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{compare, partition, protocols, run, version};

/// qnet - discrete-event simulation of distributed quantum networks
#[derive(Parser)]
#[command(name = "qnet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the protocol and algorithm workloads of a configuration
    Run {
        /// Configuration file (YAML or JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Override the random seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Write the full JSON report to this file
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Quick protocol-only run on a uniform network
    Protocols {
        /// Number of nodes
        #[arg(short, long, default_value = "2")]
        nodes: u32,

        /// Qubits per node
        #[arg(short, long, default_value = "3")]
        qubits: u32,

        /// Teleportations to run (half as many remote CNOTs follow)
        #[arg(short, long, default_value = "50")]
        operations: usize,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },

    /// Partition an algorithm circuit and print the plan
    Partition {
        /// Algorithm (ghz, qft, grover)
        #[arg(short, long, default_value = "qft")]
        algorithm: String,

        /// Logical qubits
        #[arg(short, long, default_value = "4")]
        qubits: u32,

        /// Exact number of nested partitions (greedy fill if omitted)
        #[arg(short, long)]
        partitions: Option<usize>,

        /// Nodes in the target network
        #[arg(long, default_value = "2")]
        nodes: u32,

        /// Qubits per node in the target network
        #[arg(long, default_value = "3")]
        qubits_per_node: u32,
    },

    /// Run several configurations concurrently and rank them
    Compare {
        /// Configuration files (repeat for each configuration)
        #[arg(short, long = "config", required = true)]
        configs: Vec<String>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    // Execute command
    let result = match cli.command {
        Commands::Run {
            config,
            seed,
            format,
            output,
        } => run::execute(config.as_deref(), seed, &format, output.as_deref()).await,

        Commands::Protocols {
            nodes,
            qubits,
            operations,
            seed,
        } => protocols::execute(nodes, qubits, operations, seed).await,

        Commands::Partition {
            algorithm,
            qubits,
            partitions,
            nodes,
            qubits_per_node,
        } => partition::execute(&algorithm, qubits, partitions, nodes, qubits_per_node),

        Commands::Compare { configs, format } => compare::execute(&configs, &format).await,

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
