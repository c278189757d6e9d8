//! HDBSCAN clustering parameters and presets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::metric::DistanceMetric;

/// Cluster selection method for HDBSCAN.
///
/// Determines how clusters are extracted from the condensed tree.
///
/// # Example
///
/// ```
/// use conv_cluster_core::clustering::ClusterSelectionMethod;
///
/// let method = ClusterSelectionMethod::default();
/// assert_eq!(method, ClusterSelectionMethod::Eom);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusterSelectionMethod {
    /// Excess of Mass - default, good general purpose.
    /// Selects the most persistent clusters in the hierarchy.
    #[default]
    Eom,
    /// Leaf clusters only - more granular clustering.
    Leaf,
}

impl ClusterSelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eom => "eom",
            Self::Leaf => "leaf",
        }
    }

    /// Get description of this method.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Eom => "Excess of Mass - good general purpose clustering",
            Self::Leaf => "Leaf clusters only - more granular clustering",
        }
    }
}

impl fmt::Display for ClusterSelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterSelectionMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eom" => Ok(Self::Eom),
            "leaf" => Ok(Self::Leaf),
            other => Err(PipelineError::invalid_parameter(format!(
                "unknown cluster selection method '{}', expected eom or leaf",
                other
            ))),
        }
    }
}

/// Named parameter sets of the two pipeline variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusterPreset {
    /// Clustering of a fresh embedding: min_cluster_size 5, min_samples 3.
    #[default]
    Embedding,
    /// Re-clustering of existing coordinates: min_cluster_size 3,
    /// min_samples 2, epsilon 0.25.
    Granular,
}

impl ClusterPreset {
    pub fn params(&self) -> HdbscanParams {
        match self {
            Self::Embedding => HdbscanParams::embedding_preset(),
            Self::Granular => HdbscanParams::granular_preset(),
        }
    }
}

impl FromStr for ClusterPreset {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "embedding" => Ok(Self::Embedding),
            "granular" => Ok(Self::Granular),
            other => Err(PipelineError::invalid_parameter(format!(
                "unknown cluster preset '{}', expected embedding or granular",
                other
            ))),
        }
    }
}

/// Parameters for HDBSCAN clustering.
///
/// # Example
///
/// ```
/// use conv_cluster_core::clustering::{ClusterSelectionMethod, HdbscanParams};
///
/// let params = HdbscanParams::default()
///     .with_min_cluster_size(4)
///     .with_selection_method(ClusterSelectionMethod::Leaf);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HdbscanParams {
    /// Minimum number of points to form a cluster.
    pub min_cluster_size: usize,

    /// Core distance = distance to the min_samples-th nearest other point.
    pub min_samples: usize,

    /// Clusters born below this distance are merged upward. 0.0 disables.
    pub cluster_selection_epsilon: f64,

    /// Method for selecting clusters from the condensed tree.
    pub cluster_selection_method: ClusterSelectionMethod,

    /// Distance metric.
    pub metric: DistanceMetric,
}

impl Default for HdbscanParams {
    fn default() -> Self {
        Self::embedding_preset()
    }
}

impl HdbscanParams {
    /// Parameters used when clustering a fresh UMAP embedding.
    pub fn embedding_preset() -> Self {
        Self {
            min_cluster_size: 5,
            min_samples: 3,
            cluster_selection_epsilon: 0.0,
            cluster_selection_method: ClusterSelectionMethod::Eom,
            metric: DistanceMetric::Euclidean,
        }
    }

    /// Parameters used when re-clustering existing 2D coordinates.
    pub fn granular_preset() -> Self {
        Self {
            min_cluster_size: 3,
            min_samples: 2,
            cluster_selection_epsilon: 0.25,
            cluster_selection_method: ClusterSelectionMethod::Eom,
            metric: DistanceMetric::Euclidean,
        }
    }

    /// Set minimum cluster size.
    ///
    /// Value is NOT automatically clamped - use validate() to check.
    #[must_use]
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    /// Set minimum samples.
    ///
    /// Value is NOT automatically clamped - use validate() to check.
    #[must_use]
    pub fn with_min_samples(mut self, samples: usize) -> Self {
        self.min_samples = samples;
        self
    }

    #[must_use]
    pub fn with_selection_epsilon(mut self, epsilon: f64) -> Self {
        self.cluster_selection_epsilon = epsilon;
        self
    }

    #[must_use]
    pub fn with_selection_method(mut self, method: ClusterSelectionMethod) -> Self {
        self.cluster_selection_method = method;
        self
    }

    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidParameter` if:
    /// - min_cluster_size < 2
    /// - min_samples < 1
    /// - cluster_selection_epsilon is negative or not finite
    pub fn validate(&self) -> Result<()> {
        if self.min_cluster_size < 2 {
            return Err(PipelineError::invalid_parameter(format!(
                "min_cluster_size must be >= 2, got {}. HDBSCAN requires at least 2 points to form a cluster.",
                self.min_cluster_size
            )));
        }

        if self.min_samples < 1 {
            return Err(PipelineError::invalid_parameter(format!(
                "min_samples must be >= 1, got {}",
                self.min_samples
            )));
        }

        if !self.cluster_selection_epsilon.is_finite() || self.cluster_selection_epsilon < 0.0 {
            return Err(PipelineError::invalid_parameter(format!(
                "cluster_selection_epsilon must be finite and >= 0, got {}",
                self.cluster_selection_epsilon
            )));
        }

        Ok(())
    }

    /// Check if these params will work for a given data size.
    ///
    /// Returns false if there are fewer points than min_cluster_size.
    #[inline]
    pub fn is_viable_for_size(&self, n_points: usize) -> bool {
        n_points >= self.min_cluster_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_match_both_pipeline_variants() {
        let embedding = ClusterPreset::Embedding.params();
        assert_eq!(embedding.min_cluster_size, 5);
        assert_eq!(embedding.min_samples, 3);
        assert_eq!(embedding.cluster_selection_epsilon, 0.0);

        let granular = ClusterPreset::Granular.params();
        assert_eq!(granular.min_cluster_size, 3);
        assert_eq!(granular.min_samples, 2);
        assert_eq!(granular.cluster_selection_epsilon, 0.25);
        assert_eq!(granular.cluster_selection_method, ClusterSelectionMethod::Eom);

        assert!(embedding.validate().is_ok());
        assert!(granular.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_min_cluster_size_below_2() {
        let err = HdbscanParams::default()
            .with_min_cluster_size(1)
            .validate()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("min_cluster_size"), "message: {msg}");
        assert!(msg.contains('2'));
    }

    #[test]
    fn test_validation_rejects_min_samples_zero() {
        let err = HdbscanParams::default().with_min_samples(0).validate().unwrap_err();
        assert!(err.to_string().contains("min_samples"));
    }

    #[test]
    fn test_validation_rejects_negative_epsilon() {
        assert!(HdbscanParams::default()
            .with_selection_epsilon(-0.1)
            .validate()
            .is_err());
        assert!(HdbscanParams::default()
            .with_selection_epsilon(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_min_samples_may_exceed_min_cluster_size() {
        let params = HdbscanParams::default()
            .with_min_cluster_size(2)
            .with_min_samples(6);
        assert!(params.validate().is_ok());
        assert!(params.is_viable_for_size(2));
    }

    #[test]
    fn test_builder_does_not_auto_clamp() {
        let params = HdbscanParams::default()
            .with_min_cluster_size(1)
            .with_min_samples(0);
        assert_eq!(params.min_cluster_size, 1);
        assert_eq!(params.min_samples, 0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_selection_method_parse_and_serde() {
        assert_eq!("EOM".parse::<ClusterSelectionMethod>().expect("eom"), ClusterSelectionMethod::Eom);
        assert_eq!("leaf".parse::<ClusterSelectionMethod>().expect("leaf"), ClusterSelectionMethod::Leaf);
        assert!("tree".parse::<ClusterSelectionMethod>().is_err());
        assert_eq!(
            serde_json::to_string(&ClusterSelectionMethod::Leaf).expect("json"),
            "\"leaf\""
        );
        assert_ne!(
            ClusterSelectionMethod::Eom.description(),
            ClusterSelectionMethod::Leaf.description()
        );
    }

    #[test]
    fn test_toml_section_overrides_defaults() {
        let params: HdbscanParams =
            toml::from_str("min_cluster_size = 8\ncluster_selection_method = \"leaf\"").expect("toml");
        assert_eq!(params.min_cluster_size, 8);
        assert_eq!(params.min_samples, 3);
        assert_eq!(params.cluster_selection_method, ClusterSelectionMethod::Leaf);
    }
}
