//! Stochastic gradient descent layout of the fuzzy graph in 2D.
//!
//! Edges are sampled proportionally to their weight (attractive force) and
//! each positive sample is followed by `negative_sample_rate` uniformly drawn
//! negative samples (repulsive force). The learning rate decays linearly to
//! zero over the epochs.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::config::constants::umap;

use super::fuzzy::FuzzyGraph;

/// Inputs of the layout optimizer that are not part of the graph.
#[derive(Debug, Clone, Copy)]
pub struct LayoutSettings {
    pub a: f64,
    pub b: f64,
    pub n_epochs: usize,
    pub learning_rate: f64,
    pub negative_sample_rate: usize,
    pub repulsion_strength: f64,
}

#[inline]
fn clip(v: f64) -> f64 {
    v.clamp(-umap::GRADIENT_CLIP, umap::GRADIENT_CLIP)
}

#[inline]
fn squared_distance(p: [f64; 2], q: [f64; 2]) -> f64 {
    let dx = p[0] - q[0];
    let dy = p[1] - q[1];
    dx * dx + dy * dy
}

/// Uniform initial positions in `[-INIT_BOX, INIT_BOX]^2`.
pub fn random_init(n_points: usize, rng: &mut ChaCha8Rng) -> Vec<[f64; 2]> {
    (0..n_points)
        .map(|_| {
            [
                rng.gen_range(-umap::INIT_BOX..umap::INIT_BOX),
                rng.gen_range(-umap::INIT_BOX..umap::INIT_BOX),
            ]
        })
        .collect()
}

/// Prune edges below `max_weight / n_epochs`; they would never be sampled.
pub fn prune_edges(graph: &FuzzyGraph, n_epochs: usize) -> Vec<(usize, usize, f64)> {
    let threshold = graph.max_weight() / n_epochs as f64;
    graph
        .edges
        .iter()
        .copied()
        .filter(|&(_, _, w)| w >= threshold)
        .collect()
}

/// Per-edge sampling period in epochs: the heaviest edge is sampled every
/// epoch, an edge of half that weight every second epoch, and so on.
pub fn epochs_per_sample(edges: &[(usize, usize, f64)], n_epochs: usize) -> Vec<f64> {
    let max_weight = edges.iter().map(|e| e.2).fold(0.0, f64::max);
    edges
        .iter()
        .map(|&(_, _, w)| {
            let n_samples = n_epochs as f64 * (w / max_weight);
            if n_samples > 0.0 {
                n_epochs as f64 / n_samples
            } else {
                -1.0
            }
        })
        .collect()
}

/// Run the SGD optimization in place.
pub fn optimize_layout(
    embedding: &mut [[f64; 2]],
    edges: &[(usize, usize, f64)],
    settings: &LayoutSettings,
    rng: &mut ChaCha8Rng,
) {
    let n_vertices = embedding.len();
    if n_vertices == 0 || edges.is_empty() {
        return;
    }

    let LayoutSettings { a, b, .. } = *settings;
    let n_epochs = settings.n_epochs;
    let gamma = settings.repulsion_strength;

    let eps = epochs_per_sample(edges, n_epochs);
    let neg_rate = settings.negative_sample_rate.max(1) as f64;
    let eps_neg: Vec<f64> = eps.iter().map(|&e| e / neg_rate).collect();
    let mut next_sample = eps.clone();
    let mut next_negative = eps_neg.clone();

    for epoch in 0..n_epochs {
        let alpha = settings.learning_rate * (1.0 - epoch as f64 / n_epochs as f64);
        let n = epoch as f64;

        for (e, &(head, tail, _)) in edges.iter().enumerate() {
            if eps[e] <= 0.0 || next_sample[e] > n {
                continue;
            }

            let current = embedding[head];
            let other = embedding[tail];
            let dist_sq = squared_distance(current, other);

            let grad_coeff = if dist_sq > 0.0 {
                (-2.0 * a * b * dist_sq.powf(b - 1.0)) / (a * dist_sq.powf(b) + 1.0)
            } else {
                0.0
            };

            for d in 0..2 {
                let grad = clip(grad_coeff * (current[d] - other[d]));
                embedding[head][d] += grad * alpha;
                embedding[tail][d] -= grad * alpha;
            }

            next_sample[e] += eps[e];

            if settings.negative_sample_rate == 0 {
                continue;
            }
            let n_neg = ((n - next_negative[e]) / eps_neg[e]).floor().max(0.0) as usize;

            for _ in 0..n_neg {
                let k = rng.gen_range(0..n_vertices);
                if k == head {
                    continue;
                }
                let current = embedding[head];
                let other = embedding[k];
                let dist_sq = squared_distance(current, other);

                let grad_coeff = if dist_sq > 0.0 {
                    (2.0 * gamma * b) / ((0.001 + dist_sq) * (a * dist_sq.powf(b) + 1.0))
                } else {
                    0.0
                };

                if grad_coeff > 0.0 {
                    for d in 0..2 {
                        let grad = clip(grad_coeff * (current[d] - other[d]));
                        embedding[head][d] += grad * alpha;
                    }
                }
            }

            next_negative[e] += n_neg as f64 * eps_neg[e];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_random_init_is_seeded_and_bounded() {
        let a = random_init(50, &mut ChaCha8Rng::seed_from_u64(3));
        let b = random_init(50, &mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(a, b);
        assert!(a
            .iter()
            .flatten()
            .all(|v| (-umap::INIT_BOX..umap::INIT_BOX).contains(v)));
    }

    #[test]
    fn test_epochs_per_sample_scales_inversely_with_weight() {
        let edges = vec![(0, 1, 1.0), (1, 0, 0.5), (1, 2, 0.25)];
        let eps = epochs_per_sample(&edges, 100);
        assert_eq!(eps, vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_prune_drops_negligible_edges() {
        let graph = FuzzyGraph {
            n_points: 3,
            edges: vec![(0, 1, 1.0), (1, 0, 1.0), (1, 2, 0.001), (2, 1, 0.001)],
        };
        let kept = prune_edges(&graph, 200);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_attraction_pulls_connected_pair_together() {
        let mut embedding = vec![[-5.0, 0.0], [5.0, 0.0]];
        let edges = vec![(0, 1, 1.0), (1, 0, 1.0)];
        let settings = LayoutSettings {
            a: 1.577,
            b: 0.895,
            n_epochs: 50,
            learning_rate: 1.0,
            negative_sample_rate: 0,
            repulsion_strength: 1.0,
        };
        let before = squared_distance(embedding[0], embedding[1]);
        optimize_layout(
            &mut embedding,
            &edges,
            &settings,
            &mut ChaCha8Rng::seed_from_u64(0),
        );
        let after = squared_distance(embedding[0], embedding[1]);
        assert!(after < before, "pair should move closer: {before} -> {after}");
    }
}
