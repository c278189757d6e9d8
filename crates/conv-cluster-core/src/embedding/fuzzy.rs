//! Fuzzy simplicial set construction.
//!
//! Turns the k-NN graph into a weighted undirected graph:
//!
//! 1. Per point, `rho` = distance to the nearest non-identical neighbor and
//!    `sigma` = bandwidth such that `sum_j exp(-(d_j - rho) / sigma) = log2(k)`
//! 2. Directed membership `w(i->j) = exp(-(d_ij - rho_i) / sigma_i)`, 1.0 when
//!    `d_ij <= rho_i`
//! 3. Fuzzy union: `w = a + b - a*b` for the two directions

use std::collections::BTreeMap;

use crate::config::constants::umap;

use super::knn::KnnGraph;

/// Symmetric weighted graph, edges stored in both directions.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyGraph {
    pub n_points: usize,
    /// `(head, tail, weight)` sorted by `(head, tail)`; weights in (0, 1].
    pub edges: Vec<(usize, usize, f64)>,
}

impl FuzzyGraph {
    pub fn max_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.2).fold(0.0, f64::max)
    }
}

/// Per-point `(sigmas, rhos)` of the smooth k-NN distance.
pub fn smooth_knn_dist(knn: &KnnGraph, local_connectivity: f64) -> (Vec<f64>, Vec<f64>) {
    let k = knn.k();
    let target = (k as f64).log2();
    let mean_distances = knn.mean_distance();

    let mut sigmas = Vec::with_capacity(knn.n_points());
    let mut rhos = Vec::with_capacity(knn.n_points());

    for dists in &knn.distances {
        let non_zero: Vec<f64> = dists.iter().copied().filter(|&d| d > 0.0).collect();

        let mut rho = 0.0;
        if non_zero.len() as f64 >= local_connectivity {
            let index = local_connectivity.floor() as usize;
            let interpolation = local_connectivity - index as f64;
            if index > 0 {
                rho = non_zero[index - 1];
                if interpolation > umap::SMOOTH_K_TOLERANCE {
                    rho += interpolation * (non_zero[index] - non_zero[index - 1]);
                }
            } else {
                rho = interpolation * non_zero[0];
            }
        } else if !non_zero.is_empty() {
            rho = non_zero.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        }

        let mut lo = 0.0;
        let mut hi = f64::INFINITY;
        let mut mid = 1.0;

        for _ in 0..umap::SMOOTH_K_ITERATIONS {
            let psum: f64 = dists
                .iter()
                .skip(1)
                .map(|&d| {
                    let delta = d - rho;
                    if delta > 0.0 {
                        (-(delta / mid)).exp()
                    } else {
                        1.0
                    }
                })
                .sum();

            if (psum - target).abs() < umap::SMOOTH_K_TOLERANCE {
                break;
            }

            if psum > target {
                hi = mid;
                mid = (lo + hi) / 2.0;
            } else {
                lo = mid;
                if hi == f64::INFINITY {
                    mid *= 2.0;
                } else {
                    mid = (lo + hi) / 2.0;
                }
            }
        }

        let mut sigma = mid;
        if rho > 0.0 {
            let mean_ith = dists.iter().sum::<f64>() / dists.len() as f64;
            if sigma < umap::MIN_K_DIST_SCALE * mean_ith {
                sigma = umap::MIN_K_DIST_SCALE * mean_ith;
            }
        } else if sigma < umap::MIN_K_DIST_SCALE * mean_distances {
            sigma = umap::MIN_K_DIST_SCALE * mean_distances;
        }

        sigmas.push(sigma);
        rhos.push(rho);
    }

    (sigmas, rhos)
}

/// Build the symmetric fuzzy graph from a k-NN graph.
pub fn fuzzy_simplicial_set(knn: &KnnGraph) -> FuzzyGraph {
    let (sigmas, rhos) = smooth_knn_dist(knn, umap::LOCAL_CONNECTIVITY);

    // (forward, backward) directed weights per ordered pair
    let mut pairs: BTreeMap<(usize, usize), (f64, f64)> = BTreeMap::new();

    for (i, (idx_row, dist_row)) in knn.indices.iter().zip(&knn.distances).enumerate() {
        for (&j, &d) in idx_row.iter().zip(dist_row) {
            if j == i {
                continue;
            }
            let delta = d - rhos[i];
            let w = if delta <= 0.0 || sigmas[i] == 0.0 {
                1.0
            } else {
                (-(delta / sigmas[i])).exp()
            };
            if w <= 0.0 {
                continue;
            }
            pairs.entry((i, j)).or_insert((0.0, 0.0)).0 = w;
            pairs.entry((j, i)).or_insert((0.0, 0.0)).1 = w;
        }
    }

    let edges = pairs
        .into_iter()
        .filter_map(|((i, j), (a, b))| {
            let w = a + b - a * b;
            (w > 0.0).then_some((i, j, w))
        })
        .collect();

    FuzzyGraph {
        n_points: knn.n_points(),
        edges,
    }
}
