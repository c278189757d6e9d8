//! Conversation Cluster CLI
//!
//! Command-line driver for the conversation feature clustering pipeline.
//!
//! # Commands
//!
//! - `run`: scale, embed and cluster a feature file, write annotated records
//!   plus a metadata sidecar
//! - `recluster`: re-cluster the coordinates of an annotated file
//! - `summary`: print the cluster summary of an annotated file
//!
//! # Exit Codes
//! - 0: Success
//! - 1: Input or configuration error
//! - 2: Output could not be written

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod error;

/// Conversation Cluster CLI - UMAP + HDBSCAN over conversation features
#[derive(Parser)]
#[command(name = "conv-cluster")]
#[command(version)]
#[command(about = "Embed and cluster conversation feature vectors")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over a feature file
    Run(commands::run::RunArgs),
    /// Re-cluster existing coordinates of an annotated file
    Recluster(commands::recluster::ReclusterArgs),
    /// Print the cluster summary of an annotated file
    Summary(commands::summary::SummaryArgs),
}

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match cli.command {
        Commands::Run(args) => commands::run::run_command(args),
        Commands::Recluster(args) => commands::recluster::recluster_command(args),
        Commands::Summary(args) => commands::summary::summary_command(args),
    };

    std::process::exit(exit_code);
}
