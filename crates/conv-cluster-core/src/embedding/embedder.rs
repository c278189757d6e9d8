//! UMAP embedder: scaled feature matrix in, N×2 coordinates out.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::config::constants::umap;
use crate::error::{PipelineError, Result};
use crate::matrix::{CoordinateMatrix, FeatureMatrix};

use super::curve::find_ab_params;
use super::fuzzy::fuzzy_simplicial_set;
use super::knn::exact_knn;
use super::layout::{optimize_layout, prune_edges, random_init, LayoutSettings};
use super::params::UmapParams;

/// Projects a feature matrix into 2D.
///
/// Single-threaded and driven by a `ChaCha8Rng` seeded from
/// `random_state`, so identical input and parameters give bit-identical
/// coordinates.
///
/// # Example
///
/// ```
/// use conv_cluster_core::embedding::{UmapEmbedder, UmapParams};
/// use conv_cluster_core::matrix::FeatureMatrix;
///
/// let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i % 3) as f64]).collect();
/// let matrix = FeatureMatrix::from_rows(vec!["a".into(), "b".into()], rows).unwrap();
///
/// let embedder = UmapEmbedder::new(UmapParams::default().with_n_neighbors(5).with_n_epochs(50));
/// let coords = embedder.fit_transform(&matrix).unwrap();
/// assert_eq!(coords.n_rows(), 20);
/// assert_eq!(coords.n_cols(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct UmapEmbedder {
    params: UmapParams,
}

impl UmapEmbedder {
    pub fn new(params: UmapParams) -> Self {
        Self { params }
    }

    pub fn with_defaults() -> Self {
        Self::new(UmapParams::default())
    }

    pub fn params(&self) -> &UmapParams {
        &self.params
    }

    /// Embed `matrix` (one output row per input row, same order).
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if the parameters fail validation or the matrix
    ///   contains non-finite values
    /// - `DegenerateInput` if there are fewer rows than `n_neighbors`
    ///
    /// # Degenerate input
    ///
    /// When every row is identical there is no neighborhood structure to
    /// preserve; every point is placed at `(0.0, 0.0)`.
    pub fn fit_transform(&self, matrix: &FeatureMatrix) -> Result<CoordinateMatrix> {
        self.params.validate()?;

        let n = matrix.n_rows();
        if n < self.params.n_neighbors {
            return Err(PipelineError::degenerate(
                "embedding",
                self.params.n_neighbors,
                n,
            ));
        }
        if !matrix.is_finite() {
            return Err(PipelineError::invalid_parameter(
                "embedding input contains NaN or infinite values",
            ));
        }

        info!(
            n_points = n,
            n_features = matrix.n_cols(),
            random_state = self.params.random_state,
            n_neighbors = self.params.n_neighbors,
            min_dist = self.params.min_dist,
            metric = %self.params.metric,
            "Running UMAP"
        );

        if matrix.all_rows_identical() {
            warn!(
                n_points = n,
                "All input rows are identical; placing every point at the origin"
            );
            return Ok(CoordinateMatrix::coordinates(vec![[0.0, 0.0]; n]));
        }

        let knn = exact_knn(matrix, self.params.n_neighbors, self.params.metric);
        let graph = fuzzy_simplicial_set(&knn);
        let n_epochs = self.params.resolved_epochs(n);
        let edges = prune_edges(&graph, n_epochs);

        debug!(
            graph_edges = graph.edges.len(),
            sampled_edges = edges.len(),
            n_epochs,
            "Fuzzy simplicial set built"
        );

        let (a, b) = find_ab_params(self.params.spread, self.params.min_dist);

        let mut rng = ChaCha8Rng::seed_from_u64(self.params.random_state);
        let mut embedding = random_init(n, &mut rng);

        let settings = LayoutSettings {
            a,
            b,
            n_epochs,
            learning_rate: self.params.learning_rate,
            negative_sample_rate: self.params.negative_sample_rate,
            repulsion_strength: umap::REPULSION_STRENGTH,
        };
        optimize_layout(&mut embedding, &edges, &settings, &mut rng);

        if embedding.iter().flatten().any(|v| !v.is_finite()) {
            return Err(PipelineError::invalid_parameter(
                "UMAP layout diverged to non-finite coordinates",
            ));
        }

        info!(n_points = n, "UMAP embedding complete");
        Ok(CoordinateMatrix::coordinates(embedding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::DistanceMetric;

    /// Two tight blobs far apart in 4D.
    fn two_blobs() -> FeatureMatrix {
        let mut rows = Vec::new();
        for i in 0..15 {
            let t = i as f64 * 0.01;
            rows.push(vec![t, -t, 0.5 * t, 0.0]);
        }
        for i in 0..15 {
            let t = i as f64 * 0.01;
            rows.push(vec![10.0 + t, 10.0 - t, 10.0, 10.0 + 0.5 * t]);
        }
        let cols = (0..4).map(|j| format!("f{}", j)).collect();
        FeatureMatrix::from_rows(cols, rows).expect("matrix")
    }

    fn fast_params() -> UmapParams {
        UmapParams::default().with_n_neighbors(5).with_n_epochs(100)
    }

    fn mean_pairwise(coords: &CoordinateMatrix, pairs: &[(usize, usize)]) -> f64 {
        pairs
            .iter()
            .map(|&(i, j)| DistanceMetric::Euclidean.distance(coords.row(i), coords.row(j)))
            .sum::<f64>()
            / pairs.len() as f64
    }

    #[test]
    fn test_output_shape_and_order() {
        let m = two_blobs();
        let coords = UmapEmbedder::new(fast_params()).fit_transform(&m).expect("embed");
        assert_eq!(coords.n_rows(), m.n_rows());
        assert_eq!(coords.n_cols(), 2);
        assert!(coords.is_finite());
    }

    #[test]
    fn test_same_seed_is_bit_reproducible() {
        let m = two_blobs();
        let first = UmapEmbedder::new(fast_params()).fit_transform(&m).expect("embed");
        let second = UmapEmbedder::new(fast_params()).fit_transform(&m).expect("embed");
        assert_eq!(first.as_slice(), second.as_slice());
    }

    #[test]
    fn test_different_seed_changes_layout() {
        let m = two_blobs();
        let first = UmapEmbedder::new(fast_params()).fit_transform(&m).expect("embed");
        let second = UmapEmbedder::new(fast_params().with_random_state(7))
            .fit_transform(&m)
            .expect("embed");
        assert_ne!(first.as_slice(), second.as_slice());
    }

    #[test]
    fn test_blobs_stay_separated() {
        let coords = UmapEmbedder::new(fast_params())
            .fit_transform(&two_blobs())
            .expect("embed");

        let mut within = Vec::new();
        let mut across = Vec::new();
        for i in 0..30 {
            for j in (i + 1)..30 {
                if (i < 15) == (j < 15) {
                    within.push((i, j));
                } else {
                    across.push((i, j));
                }
            }
        }
        let within = mean_pairwise(&coords, &within);
        let across = mean_pairwise(&coords, &across);
        assert!(
            within < across,
            "mean within-blob distance {within:.3} should be below across-blob {across:.3}"
        );
    }

    #[test]
    fn test_fewer_points_than_neighbors_is_degenerate() {
        let m = FeatureMatrix::from_rows(vec!["x".into()], vec![vec![0.0], vec![1.0], vec![2.0]])
            .expect("matrix");
        let err = UmapEmbedder::with_defaults().fit_transform(&m).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DegenerateInput {
                stage: "embedding",
                required: 15,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_identical_rows_fall_back_to_origin() {
        let m = FeatureMatrix::from_rows(vec!["x".into(), "y".into()], vec![vec![0.0, 0.0]; 3])
            .expect("matrix");
        let coords = UmapEmbedder::new(UmapParams::default().with_n_neighbors(2))
            .fit_transform(&m)
            .expect("identical rows must not fail");
        assert_eq!(coords.n_rows(), 3);
        assert!(coords.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_rejects_non_finite_input() {
        let mut rows = vec![vec![0.0]; 4];
        rows[2][0] = f64::NAN;
        let m = FeatureMatrix::from_rows(vec!["x".into()], rows).expect("matrix");
        let err = UmapEmbedder::new(UmapParams::default().with_n_neighbors(2))
            .fit_transform(&m)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter(_)));
    }

    #[test]
    fn test_cosine_metric_runs() {
        let coords = UmapEmbedder::new(fast_params().with_metric(DistanceMetric::Cosine))
            .fit_transform(&two_blobs())
            .expect("embed");
        assert!(coords.is_finite());
    }
}
