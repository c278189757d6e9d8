//! Root configuration for the clustering pipeline.
//!
//! `PipelineConfig` aggregates the input schema, the UMAP and HDBSCAN
//! parameters, the pipeline wiring and the output options.
//!
//! # Loading Configuration
//!
//! ```rust,ignore
//! use conv_cluster_core::config::PipelineConfig;
//!
//! let config = PipelineConfig::from_file("conv-cluster.toml")?.with_env_overrides();
//! config.validate()?;
//! ```
//!
//! # TOML Structure
//!
//! ```toml
//! [input]
//! id_field = "conv_id"
//! facilitator_field = "facilitator_name"
//!
//! [umap]
//! random_state = 100
//! n_neighbors = 15
//! min_dist = 0.1
//! metric = "euclidean"
//!
//! [hdbscan]
//! preset = "embedding"
//! min_cluster_size = 5
//!
//! [pipeline]
//! cluster_input = "embedding"
//! embed = true
//!
//! [output]
//! pretty = true
//! ```
//!
//! Every section and field is optional; omitted values keep their defaults.

pub mod constants;

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clustering::{ClusterInput, ClusterPreset, ClusterSelectionMethod, HdbscanParams};
use crate::embedding::UmapParams;
use crate::error::{PipelineError, Result};
use crate::loader::InputSchema;
use crate::metric::DistanceMetric;

/// `[hdbscan]` section: a preset plus optional per-field overrides.
///
/// Without an explicit `preset` the entry point picks one: `embedding` for a
/// full run, `granular` when re-clustering existing coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HdbscanConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<ClusterPreset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_cluster_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_samples: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_selection_epsilon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_selection_method: Option<ClusterSelectionMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<DistanceMetric>,
}

impl HdbscanConfig {
    pub fn from_preset(preset: ClusterPreset) -> Self {
        Self {
            preset: Some(preset),
            ..Default::default()
        }
    }

    /// Parameters with the overrides applied, falling back to the
    /// `embedding` preset.
    pub fn resolve(&self) -> HdbscanParams {
        self.resolve_or(ClusterPreset::Embedding)
    }

    /// Parameters with the overrides applied, using `fallback` when no preset
    /// is configured.
    pub fn resolve_or(&self, fallback: ClusterPreset) -> HdbscanParams {
        let mut params = self.preset.unwrap_or(fallback).params();
        if let Some(v) = self.min_cluster_size {
            params.min_cluster_size = v;
        }
        if let Some(v) = self.min_samples {
            params.min_samples = v;
        }
        if let Some(v) = self.cluster_selection_epsilon {
            params.cluster_selection_epsilon = v;
        }
        if let Some(v) = self.cluster_selection_method {
            params.cluster_selection_method = v;
        }
        if let Some(v) = self.metric {
            params.metric = v;
        }
        params
    }
}

/// `[pipeline]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Matrix the clusterer runs on.
    pub cluster_input: ClusterInput,
    /// Run the embedding stage. When false, `cluster_input` must be
    /// `features` and no coordinates are written.
    pub embed: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            cluster_input: ClusterInput::Embedding,
            embed: true,
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print the records array.
    pub pretty: bool,
    /// Sidecar location; defaults to `<output stem>.metadata.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            metadata_path: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputSchema,
    pub umap: UmapParams,
    pub hdbscan: HdbscanConfig,
    pub pipeline: PipelineSection,
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Defaults for re-clustering existing coordinates (granular preset).
    pub fn recluster_defaults() -> Self {
        Self {
            hdbscan: HdbscanConfig::from_preset(ClusterPreset::Granular),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// - `PipelineError::Config` if the file cannot be read
    /// - `PipelineError::Config` if TOML parsing fails
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&contents).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to parse TOML in '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        toml::from_str(toml)
            .map_err(|e| PipelineError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("Failed to serialize to TOML: {}", e)))
    }

    /// Validate all sections, returning the first error found.
    ///
    /// # Errors
    ///
    /// `PipelineError::Config` with a section-prefixed message.
    pub fn validate(&self) -> Result<()> {
        self.input
            .validate()
            .map_err(|e| PipelineError::Config(format!("[input] {}", e)))?;

        self.umap
            .validate()
            .map_err(|e| PipelineError::Config(format!("[umap] {}", e)))?;

        self.hdbscan
            .resolve()
            .validate()
            .map_err(|e| PipelineError::Config(format!("[hdbscan] {}", e)))?;

        if !self.pipeline.embed && self.pipeline.cluster_input == ClusterInput::Embedding {
            return Err(PipelineError::Config(
                "[pipeline] embed = false requires cluster_input = \"features\"".to_string(),
            ));
        }

        Ok(())
    }

    /// Apply environment variable overrides.
    ///
    /// # Supported Variables
    ///
    /// | Variable | Config Path | Type |
    /// |----------|-------------|------|
    /// | `CONV_CLUSTER_SEED` | `umap.random_state` | u64 |
    /// | `CONV_CLUSTER_N_NEIGHBORS` | `umap.n_neighbors` | usize |
    /// | `CONV_CLUSTER_MIN_DIST` | `umap.min_dist` | f64 |
    /// | `CONV_CLUSTER_MIN_CLUSTER_SIZE` | `hdbscan.min_cluster_size` | usize |
    /// | `CONV_CLUSTER_MIN_SAMPLES` | `hdbscan.min_samples` | usize |
    ///
    /// Unparsable values are ignored with a warning.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(n) = parse_override::<u64>(&lookup, "CONV_CLUSTER_SEED") {
            self.umap.random_state = n;
        }
        if let Some(n) = parse_override::<usize>(&lookup, "CONV_CLUSTER_N_NEIGHBORS") {
            self.umap.n_neighbors = n;
        }
        if let Some(f) = parse_override::<f64>(&lookup, "CONV_CLUSTER_MIN_DIST") {
            self.umap.min_dist = f;
        }
        if let Some(n) = parse_override::<usize>(&lookup, "CONV_CLUSTER_MIN_CLUSTER_SIZE") {
            self.hdbscan.min_cluster_size = Some(n);
        }
        if let Some(n) = parse_override::<usize>(&lookup, "CONV_CLUSTER_MIN_SAMPLES") {
            self.hdbscan.min_samples = Some(n);
        }
        self
    }
}

/// Parsed value of `key`; `None` when unset or unparsable.
fn parse_override<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}
