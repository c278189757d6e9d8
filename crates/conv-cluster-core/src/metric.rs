//! Distance metrics shared by the embedder and the clusterer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Distance metric used for neighbor search and density estimation.
///
/// Serialized in lowercase (`"euclidean"`, `"manhattan"`, ...) to match the
/// parameter names written to the metadata sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// L2 distance. Range [0, inf).
    #[default]
    Euclidean,
    /// L1 (taxicab) distance. Range [0, inf).
    Manhattan,
    /// L-inf distance. Range [0, inf).
    Chebyshev,
    /// Cosine distance: 1 - cos(a, b). Range [0, 2].
    Cosine,
}

impl DistanceMetric {
    /// All supported metrics, in declaration order.
    pub const ALL: [DistanceMetric; 4] = [
        DistanceMetric::Euclidean,
        DistanceMetric::Manhattan,
        DistanceMetric::Chebyshev,
        DistanceMetric::Cosine,
    ];

    /// Lowercase name as written to metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
            Self::Chebyshev => "chebyshev",
            Self::Cosine => "cosine",
        }
    }

    /// Distance between two equal-length vectors.
    ///
    /// Cosine distance between a zero vector and anything is defined as 0.0
    /// when both are zero and 1.0 otherwise.
    #[inline]
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            Self::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            Self::Chebyshev => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).abs())
                .fold(0.0, f64::max),
            Self::Cosine => {
                let mut dot = 0.0;
                let mut norm_a = 0.0;
                let mut norm_b = 0.0;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                if norm_a == 0.0 && norm_b == 0.0 {
                    0.0
                } else if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    (1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())).max(0.0)
                }
            }
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "manhattan" | "l1" | "taxicab" => Ok(Self::Manhattan),
            "chebyshev" | "linf" => Ok(Self::Chebyshev),
            "cosine" => Ok(Self::Cosine),
            other => Err(PipelineError::invalid_parameter(format!(
                "unknown distance metric '{}', expected one of euclidean, manhattan, chebyshev, cosine",
                other
            ))),
        }
    }
}
