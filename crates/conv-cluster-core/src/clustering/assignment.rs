//! Per-point cluster assignments and summary counts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Label used for noise points.
pub const NOISE_LABEL: i32 = -1;

/// Cluster membership of one record.
///
/// Noise points have `label = -1` and `probability = 0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub label: i32,
    pub probability: f64,
}

impl ClusterAssignment {
    pub fn new(label: i32, probability: f64) -> Self {
        Self { label, probability }
    }

    pub fn noise() -> Self {
        Self::new(NOISE_LABEL, 0.0)
    }

    #[inline]
    pub fn is_noise(&self) -> bool {
        self.label == NOISE_LABEL
    }
}

/// Cluster counts of a label vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Max label + 1, or 0 when every point is noise.
    pub num_clusters: usize,
    pub noise_points: usize,
    /// Size per label; index = label.
    pub cluster_sizes: Vec<usize>,
}

impl ClusterSummary {
    pub fn from_labels(labels: impl IntoIterator<Item = i32>) -> Self {
        let mut summary = Self::default();
        for label in labels {
            if label < 0 {
                summary.noise_points += 1;
                continue;
            }
            let idx = label as usize;
            if idx >= summary.cluster_sizes.len() {
                summary.cluster_sizes.resize(idx + 1, 0);
            }
            summary.cluster_sizes[idx] += 1;
        }
        summary.num_clusters = summary.cluster_sizes.len();
        summary
    }

    pub fn from_assignments(assignments: &[ClusterAssignment]) -> Self {
        Self::from_labels(assignments.iter().map(|a| a.label))
    }

    /// Points assigned to some cluster.
    pub fn clustered_points(&self) -> usize {
        self.cluster_sizes.iter().sum()
    }
}

/// One line for the counts, then one line per cluster.
impl fmt::Display for ClusterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Clusters: {}", self.num_clusters)?;
        writeln!(f, "Noise:    {}", self.noise_points)?;
        for (label, size) in self.cluster_sizes.iter().enumerate() {
            writeln!(f, "  cluster {:>3}: {}", label, size)?;
        }
        Ok(())
    }
}

/// Output of [`HdbscanClusterer::fit`](super::HdbscanClusterer::fit).
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResult {
    /// One assignment per input row, same order.
    pub assignments: Vec<ClusterAssignment>,
    pub summary: ClusterSummary,
}

impl ClusterResult {
    pub fn from_parts(labels: &[i32], probabilities: &[f64]) -> Self {
        let assignments: Vec<ClusterAssignment> = labels
            .iter()
            .zip(probabilities)
            .map(|(&label, &probability)| {
                if label < 0 {
                    ClusterAssignment::noise()
                } else {
                    ClusterAssignment::new(label, probability)
                }
            })
            .collect();
        let summary = ClusterSummary::from_assignments(&assignments);
        Self {
            assignments,
            summary,
        }
    }

    pub fn labels(&self) -> Vec<i32> {
        self.assignments.iter().map(|a| a.label).collect()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
