//! HDBSCAN clusterer.

use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::matrix::FeatureMatrix;

use super::assignment::ClusterResult;
use super::params::HdbscanParams;
use super::selection::{extract_clusters, label_points, membership_probabilities};
use super::tree::{condense_tree, core_distances, mutual_reachability_mst, single_linkage};

/// HDBSCAN clusterer for batch density-based clustering.
///
/// Implements the full HDBSCAN algorithm:
/// 1. Compute core distances (min_samples-th nearest other point)
/// 2. Build the mutual reachability minimum spanning tree
/// 3. Single-linkage hierarchy, condensed with min_cluster_size
/// 4. Select clusters by stability (EOM) or leaves, then epsilon merging
///
/// Accepts any column count, so it runs on 2D coordinates and on the
/// scaled feature matrix alike.
///
/// # Example
///
/// ```
/// use conv_cluster_core::clustering::{HdbscanClusterer, HdbscanParams};
/// use conv_cluster_core::matrix::FeatureMatrix;
///
/// let mut rows = Vec::new();
/// for i in 0..6 {
///     rows.push(vec![i as f64 * 0.1, 0.0]);
///     rows.push(vec![100.0 + i as f64 * 0.1, 0.0]);
/// }
/// let matrix = FeatureMatrix::from_rows(vec!["x".into(), "y".into()], rows).unwrap();
///
/// let clusterer = HdbscanClusterer::new(HdbscanParams::default().with_min_cluster_size(3));
/// let result = clusterer.fit(&matrix).unwrap();
/// assert_eq!(result.summary.num_clusters, 2);
/// ```
#[derive(Debug, Clone)]
pub struct HdbscanClusterer {
    params: HdbscanParams,
}

impl HdbscanClusterer {
    pub fn new(params: HdbscanParams) -> Self {
        Self { params }
    }

    /// Clusterer with the embedding preset (min_cluster_size 5, min_samples 3).
    pub fn with_defaults() -> Self {
        Self::new(HdbscanParams::default())
    }

    pub fn params(&self) -> &HdbscanParams {
        &self.params
    }

    /// Cluster the rows of `matrix`.
    ///
    /// # Returns
    ///
    /// One assignment per row, same order. Noise points have `label = -1`
    /// and `probability = 0.0`; clustered points have probability in (0, 1].
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if the parameters fail validation or the matrix
    ///   contains non-finite values
    /// - `DegenerateInput` if there are fewer rows than min_cluster_size
    pub fn fit(&self, matrix: &FeatureMatrix) -> Result<ClusterResult> {
        self.params.validate()?;

        let n = matrix.n_rows();
        if !self.params.is_viable_for_size(n) {
            return Err(PipelineError::degenerate(
                "clustering",
                self.params.min_cluster_size,
                n,
            ));
        }
        if !matrix.is_finite() {
            return Err(PipelineError::invalid_parameter(
                "clustering input contains NaN or infinite values",
            ));
        }

        info!(
            n_points = n,
            n_dims = matrix.n_cols(),
            min_cluster_size = self.params.min_cluster_size,
            min_samples = self.params.min_samples,
            cluster_selection_epsilon = self.params.cluster_selection_epsilon,
            method = %self.params.cluster_selection_method,
            metric = %self.params.metric,
            "Running HDBSCAN"
        );

        // Step 1: Core distances
        let core = core_distances(matrix, self.params.min_samples, self.params.metric);

        // Step 2: Mutual reachability MST
        let mst = mutual_reachability_mst(matrix, &core, self.params.metric);

        if let (Some(first), Some(last)) = (mst.first(), mst.last()) {
            debug!(
                mst_edges = mst.len(),
                min_weight = %format!("{:.4}", first.2),
                max_weight = %format!("{:.4}", last.2),
                "MST edge weight distribution"
            );
        }

        // Step 3: Hierarchy
        let linkage = single_linkage(&mst, n);
        let tree = condense_tree(&linkage, n, self.params.min_cluster_size);

        debug!(
            condensed_rows = tree.rows.len(),
            candidate_clusters = tree.cluster_rows().count(),
            "Condensed tree built"
        );

        // Step 4: Selection and labelling
        let clusters = extract_clusters(
            &tree,
            self.params.cluster_selection_method,
            self.params.cluster_selection_epsilon,
        );
        let labels = label_points(&tree, &clusters);
        let probabilities = membership_probabilities(&tree, &clusters, &labels);

        let result = ClusterResult::from_parts(&labels, &probabilities);

        info!(
            num_clusters = result.summary.num_clusters,
            noise_points = result.summary.noise_points,
            "HDBSCAN complete"
        );

        Ok(result)
    }
}
