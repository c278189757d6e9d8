//! Exact k-nearest-neighbor graph.
//!
//! Brute force over all pairs. Each row lists the point itself first (at
//! distance 0), then its `k - 1` nearest other points by ascending distance,
//! ties broken by index so the graph is fully deterministic.

use crate::matrix::FeatureMatrix;
use crate::metric::DistanceMetric;

/// k-NN graph: `indices[i][j]` is the j-th neighbor of point i.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnGraph {
    pub indices: Vec<Vec<usize>>,
    pub distances: Vec<Vec<f64>>,
}

impl KnnGraph {
    #[inline]
    pub fn n_points(&self) -> usize {
        self.indices.len()
    }

    /// Neighbors per point (including self).
    #[inline]
    pub fn k(&self) -> usize {
        self.indices.first().map_or(0, Vec::len)
    }

    /// Mean over every stored neighbor distance.
    pub fn mean_distance(&self) -> f64 {
        let total: usize = self.distances.iter().map(Vec::len).sum();
        if total == 0 {
            return 0.0;
        }
        self.distances.iter().flatten().sum::<f64>() / total as f64
    }
}

/// Compute the exact k-NN graph of `matrix`, `k` counting the point itself.
///
/// `k` is clamped to the number of rows.
pub fn exact_knn(matrix: &FeatureMatrix, k: usize, metric: DistanceMetric) -> KnnGraph {
    let n = matrix.n_rows();
    let k = k.min(n);
    let mut indices = Vec::with_capacity(n);
    let mut distances = Vec::with_capacity(n);

    for i in 0..n {
        let row = matrix.row(i);
        let mut candidates: Vec<(f64, usize)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| (metric.distance(row, matrix.row(j)), j))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut row_idx = Vec::with_capacity(k);
        let mut row_dist = Vec::with_capacity(k);
        row_idx.push(i);
        row_dist.push(0.0);
        for &(d, j) in candidates.iter().take(k.saturating_sub(1)) {
            row_idx.push(j);
            row_dist.push(d);
        }
        indices.push(row_idx);
        distances.push(row_dist);
    }

    KnnGraph { indices, distances }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[f64]) -> FeatureMatrix {
        FeatureMatrix::from_rows(
            vec!["x".to_string()],
            points.iter().map(|&p| vec![p]).collect(),
        )
        .expect("matrix")
    }

    #[test]
    fn test_self_is_first_neighbor() {
        let m = line(&[0.0, 1.0, 3.0, 7.0]);
        let g = exact_knn(&m, 3, DistanceMetric::Euclidean);
        for i in 0..4 {
            assert_eq!(g.indices[i][0], i);
            assert_eq!(g.distances[i][0], 0.0);
        }
        assert_eq!(g.k(), 3);
    }

    #[test]
    fn test_neighbors_sorted_by_distance() {
        let m = line(&[0.0, 1.0, 3.0, 7.0]);
        let g = exact_knn(&m, 3, DistanceMetric::Euclidean);
        assert_eq!(g.indices[0], vec![0, 1, 2]);
        assert_eq!(g.distances[0], vec![0.0, 1.0, 3.0]);
        assert_eq!(g.indices[3], vec![3, 2, 1]);
    }

    #[test]
    fn test_ties_broken_by_index() {
        let m = line(&[0.0, -1.0, 1.0]);
        let g = exact_knn(&m, 3, DistanceMetric::Euclidean);
        assert_eq!(g.indices[0], vec![0, 1, 2]);
    }

    #[test]
    fn test_k_clamped_to_n() {
        let m = line(&[0.0, 1.0]);
        let g = exact_knn(&m, 10, DistanceMetric::Euclidean);
        assert_eq!(g.k(), 2);
    }
}
