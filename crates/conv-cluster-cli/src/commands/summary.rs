//! `summary` command: print the cluster counts of an annotated file.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use conv_cluster_core::clustering::ClusterSummary;
use conv_cluster_core::config::PipelineConfig;
use conv_cluster_core::pipeline;
use tracing::debug;

use super::{finish, load_config};

/// Arguments for the `summary` command
#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// Annotated JSON records
    #[arg(long, short)]
    pub input: PathBuf,

    /// TOML configuration file (only `[input]` is used)
    #[arg(long, short, env = "CONV_CLUSTER_CONFIG")]
    pub config: Option<PathBuf>,
}

fn execute(args: &SummaryArgs) -> anyhow::Result<ClusterSummary> {
    let config = load_config(args.config.as_deref(), PipelineConfig::default())?;
    pipeline::summarize(&config, &args.input)
        .with_context(|| format!("summarizing {}", args.input.display()))
}

/// Execute the `summary` command.
pub fn summary_command(args: SummaryArgs) -> i32 {
    debug!("summary_command: args={:?}", args);
    finish("summary", execute(&args))
}
