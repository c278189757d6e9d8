//! UMAP projection parameters.

use serde::{Deserialize, Serialize};

use crate::config::constants::umap;
use crate::error::{PipelineError, Result};
use crate::metric::DistanceMetric;

/// Parameters for the UMAP projection.
///
/// Field names of the first three match the metadata sidecar
/// (`random_state`, `n_neighbors`, `min_dist`).
///
/// # Example
///
/// ```
/// use conv_cluster_core::embedding::UmapParams;
///
/// let params = UmapParams::default().with_random_state(7).with_n_neighbors(10);
/// assert_eq!(params.random_state, 7);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UmapParams {
    /// Seed of the layout RNG. Same seed + same input = same output.
    pub random_state: u64,

    /// Size of the local neighborhood, counting the point itself. Must be >= 2.
    pub n_neighbors: usize,

    /// Minimum distance between embedded points. Must be in [0, 1).
    pub min_dist: f64,

    /// Effective scale of embedded points. Must be > 0 and >= min_dist.
    pub spread: f64,

    /// Metric of the input space.
    pub metric: DistanceMetric,

    /// Number of SGD epochs. `None` picks 500 for small datasets, 200 above 10k points.
    pub n_epochs: Option<usize>,

    /// Initial SGD learning rate, decayed linearly to zero.
    pub learning_rate: f64,

    /// Negative samples per positive sample.
    pub negative_sample_rate: usize,
}

impl Default for UmapParams {
    fn default() -> Self {
        Self {
            random_state: umap::RANDOM_STATE,
            n_neighbors: umap::N_NEIGHBORS,
            min_dist: umap::MIN_DIST,
            spread: umap::SPREAD,
            metric: DistanceMetric::Euclidean,
            n_epochs: None,
            learning_rate: umap::LEARNING_RATE,
            negative_sample_rate: umap::NEGATIVE_SAMPLE_RATE,
        }
    }
}

impl UmapParams {
    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    #[must_use]
    pub fn with_n_neighbors(mut self, n: usize) -> Self {
        self.n_neighbors = n;
        self
    }

    #[must_use]
    pub fn with_min_dist(mut self, min_dist: f64) -> Self {
        self.min_dist = min_dist;
        self
    }

    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    #[must_use]
    pub fn with_n_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = Some(n_epochs);
        self
    }

    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// `PipelineError::InvalidParameter` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.n_neighbors < 2 {
            return Err(PipelineError::invalid_parameter(format!(
                "n_neighbors must be >= 2, got {}",
                self.n_neighbors
            )));
        }
        if !(0.0..1.0).contains(&self.min_dist) {
            return Err(PipelineError::invalid_parameter(format!(
                "min_dist must be in [0, 1), got {}",
                self.min_dist
            )));
        }
        if !self.spread.is_finite() || self.spread <= 0.0 {
            return Err(PipelineError::invalid_parameter(format!(
                "spread must be a finite value > 0, got {}",
                self.spread
            )));
        }
        if self.min_dist > self.spread {
            return Err(PipelineError::invalid_parameter(format!(
                "min_dist ({}) must be <= spread ({})",
                self.min_dist, self.spread
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(PipelineError::invalid_parameter(format!(
                "learning_rate must be a finite value > 0, got {}",
                self.learning_rate
            )));
        }
        if self.n_epochs == Some(0) {
            return Err(PipelineError::invalid_parameter("n_epochs must be > 0"));
        }
        Ok(())
    }

    /// Epoch count for a dataset of `n_points`.
    pub fn resolved_epochs(&self, n_points: usize) -> usize {
        self.n_epochs.unwrap_or(if n_points <= umap::LARGE_DATASET_THRESHOLD {
            umap::SMALL_DATASET_EPOCHS
        } else {
            umap::LARGE_DATASET_EPOCHS
        })
    }
}
