//! `run` command: feature file → annotated records + metadata sidecar.
//!
//! # Output
//! - stdout: record count, cluster summary and output paths
//! - stderr: logs and errors
//!
//! # Exit Codes
//! - 0: Success
//! - 1: Input or configuration error
//! - 2: Output could not be written

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use conv_cluster_core::clustering::{ClusterInput, ClusterPreset};
use conv_cluster_core::config::PipelineConfig;
use conv_cluster_core::pipeline::{self, RunReport};
use tracing::{debug, info};

use super::{finish, load_config};

/// Arguments for the `run` command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON array of feature records
    #[arg(long, short)]
    pub input: PathBuf,

    /// Where to write the annotated records
    #[arg(long, short)]
    pub output: PathBuf,

    /// TOML configuration file
    #[arg(long, short, env = "CONV_CLUSTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Metadata sidecar path (default: `<output stem>.metadata.json`)
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// UMAP random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// UMAP neighborhood size
    #[arg(long)]
    pub n_neighbors: Option<usize>,

    /// UMAP minimum distance between embedded points
    #[arg(long)]
    pub min_dist: Option<f64>,

    /// Matrix to cluster: `embedding` or `features`
    #[arg(long)]
    pub cluster_on: Option<ClusterInput>,

    /// HDBSCAN parameter preset: `embedding` or `granular`
    #[arg(long)]
    pub preset: Option<ClusterPreset>,

    /// Skip the embedding stage and cluster the scaled features
    #[arg(long)]
    pub no_embed: bool,
}

impl RunArgs {
    /// Apply command-line flags on top of `config`.
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(seed) = self.seed {
            config.umap.random_state = seed;
        }
        if let Some(n) = self.n_neighbors {
            config.umap.n_neighbors = n;
        }
        if let Some(d) = self.min_dist {
            config.umap.min_dist = d;
        }
        if let Some(preset) = self.preset {
            config.hdbscan.preset = Some(preset);
        }
        if self.no_embed {
            config.pipeline.embed = false;
            config.pipeline.cluster_input = ClusterInput::Features;
        }
        if let Some(input) = self.cluster_on {
            config.pipeline.cluster_input = input;
        }
        if let Some(path) = &self.metadata {
            config.output.metadata_path = Some(path.clone());
        }
        config
    }
}

fn execute(args: &RunArgs) -> anyhow::Result<RunReport> {
    let config = args.apply(load_config(args.config.as_deref(), PipelineConfig::default())?);
    debug!("run: config={:?}", config);
    info!(
        "run: input={} output={} embed={} cluster_input={}",
        args.input.display(),
        args.output.display(),
        config.pipeline.embed,
        config.pipeline.cluster_input
    );

    pipeline::run(&config, &args.input, &args.output)
        .with_context(|| format!("clustering {}", args.input.display()))
}

/// Execute the `run` command.
pub fn run_command(args: RunArgs) -> i32 {
    debug!("run_command: args={:?}", args);
    finish("run", execute(&args))
}
