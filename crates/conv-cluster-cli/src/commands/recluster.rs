//! `recluster` command: re-cluster the 2D coordinates of an annotated file.
//!
//! Coordinates are read from `--x-field`/`--y-field` and left untouched;
//! `cluster` and `cluster_probability` are overwritten. Without `--output`
//! the input file is rewritten in place.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use conv_cluster_core::clustering::{ClusterPreset, ClusterSelectionMethod};
use conv_cluster_core::config::constants::fields;
use conv_cluster_core::config::PipelineConfig;
use conv_cluster_core::pipeline::{self, RunReport};
use tracing::{debug, info};

use super::{finish, load_config};

/// Arguments for the `recluster` command
#[derive(Args, Debug)]
pub struct ReclusterArgs {
    /// Annotated JSON records (output of `run`)
    #[arg(long, short)]
    pub input: PathBuf,

    /// Where to write the result (default: overwrite the input)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// TOML configuration file (default: granular preset)
    #[arg(long, short, env = "CONV_CLUSTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Metadata sidecar path (default: `<output stem>.metadata.json`)
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Field holding the x coordinate
    #[arg(long, default_value = fields::UMAP_X)]
    pub x_field: String,

    /// Field holding the y coordinate
    #[arg(long, default_value = fields::UMAP_Y)]
    pub y_field: String,

    /// HDBSCAN parameter preset: `granular` or `embedding`
    #[arg(long)]
    pub preset: Option<ClusterPreset>,

    /// Override the preset's minimum cluster size
    #[arg(long)]
    pub min_cluster_size: Option<usize>,

    /// Override the preset's min_samples
    #[arg(long)]
    pub min_samples: Option<usize>,

    /// Override the preset's cluster selection epsilon
    #[arg(long)]
    pub epsilon: Option<f64>,

    /// Override the preset's selection method: `eom` or `leaf`
    #[arg(long)]
    pub selection: Option<ClusterSelectionMethod>,
}

impl ReclusterArgs {
    /// Apply command-line flags on top of `config`.
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(preset) = self.preset {
            config.hdbscan.preset = Some(preset);
        }
        if let Some(n) = self.min_cluster_size {
            config.hdbscan.min_cluster_size = Some(n);
        }
        if let Some(n) = self.min_samples {
            config.hdbscan.min_samples = Some(n);
        }
        if let Some(eps) = self.epsilon {
            config.hdbscan.cluster_selection_epsilon = Some(eps);
        }
        if let Some(method) = self.selection {
            config.hdbscan.cluster_selection_method = Some(method);
        }
        if let Some(path) = &self.metadata {
            config.output.metadata_path = Some(path.clone());
        }
        config
    }

    fn output_path(&self) -> &PathBuf {
        self.output.as_ref().unwrap_or(&self.input)
    }
}

fn execute(args: &ReclusterArgs) -> anyhow::Result<RunReport> {
    let config = args.apply(load_config(
        args.config.as_deref(),
        PipelineConfig::recluster_defaults(),
    )?);
    let output = args.output_path();
    debug!(
        "recluster: hdbscan={:?}",
        config.hdbscan.resolve_or(ClusterPreset::Granular)
    );
    info!(
        "recluster: input={} output={} fields=({}, {})",
        args.input.display(),
        output.display(),
        args.x_field,
        args.y_field
    );

    pipeline::recluster(&config, &args.input, output, &args.x_field, &args.y_field)
        .with_context(|| format!("re-clustering {}", args.input.display()))
}

/// Execute the `recluster` command.
pub fn recluster_command(args: ReclusterArgs) -> i32 {
    debug!("recluster_command: args={:?}", args);
    finish("recluster", execute(&args))
}
