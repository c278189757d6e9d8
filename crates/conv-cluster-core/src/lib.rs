//! Conversation Cluster Core Library
//!
//! Offline analysis pipeline over precomputed conversational-feature
//! vectors: standardize the features, project them to 2D with UMAP, cluster
//! with HDBSCAN, and write the annotated records plus a metadata sidecar.
//!
//! # Architecture
//!
//! Data flows strictly forward:
//!
//! - [`loader`]: JSON records → `FeatureRecord`s + `FeatureMatrix`
//! - [`scaler`]: per-column z-scores
//! - [`embedding`]: UMAP projection to an N×2 `CoordinateMatrix`
//! - [`clustering`]: HDBSCAN labels (-1 = noise) and probabilities
//! - [`annotate`] / [`persist`]: merge results into records, write outputs
//!
//! [`pipeline`] wires the stages together; [`config`] holds the TOML
//! configuration and presets.
//!
//! # Example
//!
//! ```
//! use conv_cluster_core::clustering::HdbscanParams;
//! use conv_cluster_core::config::PipelineConfig;
//!
//! let config = PipelineConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.hdbscan.resolve(), HdbscanParams::embedding_preset());
//! ```

pub mod annotate;
pub mod clustering;
pub mod config;
pub mod embedding;
pub mod error;
pub mod loader;
pub mod matrix;
pub mod metric;
pub mod persist;
pub mod pipeline;
pub mod scaler;

// Re-exports for convenience
pub use clustering::{ClusterAssignment, ClusterInput, ClusterSummary, HdbscanClusterer, HdbscanParams};
pub use config::PipelineConfig;
pub use embedding::{UmapEmbedder, UmapParams};
pub use error::{PipelineError, Result};
pub use loader::{FeatureRecord, InputSchema};
pub use matrix::{CoordinateMatrix, FeatureMatrix};
pub use metric::DistanceMetric;
pub use pipeline::{RunOutcome, RunReport};
