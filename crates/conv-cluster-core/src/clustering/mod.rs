//! HDBSCAN density-based clustering.
//!
//! # Algorithm
//!
//! 1. Core distances and the mutual reachability MST ([`tree`])
//! 2. Single-linkage hierarchy condensed with `min_cluster_size` ([`tree`])
//! 3. Stability-based (EOM) or leaf selection, epsilon merging ([`selection`])
//! 4. Point labels and membership probabilities ([`selection`])
//!
//! # Key Types
//!
//! - [`HdbscanParams`]: min_cluster_size, min_samples, epsilon, method, metric
//! - [`HdbscanClusterer`]: runs the algorithm
//! - [`ClusterAssignment`]: label (-1 = noise) + probability per point
//! - [`ClusterSummary`]: cluster count, noise count, sizes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub mod assignment;
pub mod clusterer;
pub mod params;
pub mod selection;
pub mod tree;

pub use assignment::{ClusterAssignment, ClusterResult, ClusterSummary, NOISE_LABEL};
pub use clusterer::HdbscanClusterer;
pub use params::{ClusterPreset, ClusterSelectionMethod, HdbscanParams};

/// Which matrix the clusterer runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusterInput {
    /// The 2D embedding coordinates.
    #[default]
    Embedding,
    /// The scaled feature matrix.
    Features,
}

impl ClusterInput {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Features => "features",
        }
    }
}

impl fmt::Display for ClusterInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterInput {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "embedding" => Ok(Self::Embedding),
            "features" => Ok(Self::Features),
            other => Err(PipelineError::invalid_parameter(format!(
                "unknown cluster input '{}', expected embedding or features",
                other
            ))),
        }
    }
}
