//! Cluster extraction from the condensed tree.
//!
//! Stability, EOM/leaf selection, epsilon merging, point labels and
//! membership probabilities. The root cluster is never selected, so a
//! dataset with no split is all noise.

use std::collections::{BTreeMap, BTreeSet};

use super::params::ClusterSelectionMethod;
use super::tree::CondensedTree;

/// Excess-of-mass stability per cluster id (root included).
///
/// stability(c) = Σ over rows with parent c of (λ_row − λ_birth(c)) · child_size
pub fn compute_stability(tree: &CondensedTree) -> BTreeMap<usize, f64> {
    let root = tree.root();
    let mut births = vec![0.0; tree.cluster_id_bound()];
    for row in tree.cluster_rows() {
        births[row.child] = row.lambda;
    }
    births[root] = 0.0;

    let mut stability = BTreeMap::new();
    stability.insert(root, 0.0);
    for row in tree.cluster_rows() {
        stability.entry(row.child).or_insert(0.0);
    }
    for row in &tree.rows {
        let contribution = (row.lambda - births[row.parent]) * row.child_size as f64;
        *stability.entry(row.parent).or_insert(0.0) += contribution;
    }
    stability
}

/// Excess of Mass: walk clusters from the leaves up, keeping a cluster
/// when its own stability beats the sum of its children's.
pub fn select_eom(tree: &CondensedTree, stability: &BTreeMap<usize, f64>) -> BTreeSet<usize> {
    let root = tree.root();
    let mut stability = stability.clone();
    let mut is_cluster: BTreeMap<usize, bool> = stability
        .keys()
        .filter(|&&c| c != root)
        .map(|&c| (c, true))
        .collect();

    let nodes: Vec<usize> = is_cluster.keys().rev().copied().collect();
    for node in nodes {
        let subtree: f64 = tree
            .child_clusters(node)
            .iter()
            .map(|c| stability.get(c).copied().unwrap_or(0.0))
            .sum();
        let own = stability.get(&node).copied().unwrap_or(0.0);

        if subtree > own {
            is_cluster.insert(node, false);
            stability.insert(node, subtree);
        } else {
            for sub in tree.descendants(node).into_iter().skip(1) {
                is_cluster.insert(sub, false);
            }
        }
    }

    is_cluster
        .into_iter()
        .filter_map(|(c, keep)| keep.then_some(c))
        .collect()
}

/// Clusters with no child clusters.
pub fn select_leaves(tree: &CondensedTree) -> BTreeSet<usize> {
    let parents: BTreeSet<usize> = tree.cluster_rows().map(|r| r.parent).collect();
    tree.cluster_rows()
        .map(|r| r.child)
        .filter(|c| !parents.contains(c))
        .collect()
}

/// Nearest ancestor of `leaf` born at a distance above `epsilon`; never the
/// root. Falls back to `leaf` itself when it hangs directly off the root.
fn traverse_upwards(tree: &CondensedTree, epsilon: f64, leaf: usize) -> usize {
    let root = tree.root();
    let mut current = leaf;
    loop {
        let Some(parent) = tree.parent_of(current) else {
            return current;
        };
        if parent == root {
            return current;
        }
        let parent_eps = tree.birth_lambda(parent).map_or(f64::INFINITY, |l| 1.0 / l);
        if parent_eps > epsilon {
            return parent;
        }
        current = parent;
    }
}

/// Replace every selected cluster born below `epsilon` by its nearest
/// ancestor born above it.
pub fn epsilon_search(tree: &CondensedTree, selected: &BTreeSet<usize>, epsilon: f64) -> BTreeSet<usize> {
    let mut result = BTreeSet::new();
    let mut processed = BTreeSet::new();

    for &cluster in selected {
        let eps = tree.birth_lambda(cluster).map_or(f64::INFINITY, |l| 1.0 / l);
        if eps < epsilon {
            if processed.contains(&cluster) {
                continue;
            }
            let merged = traverse_upwards(tree, epsilon, cluster);
            result.insert(merged);
            processed.extend(tree.descendants(merged).into_iter().skip(1));
        } else {
            result.insert(cluster);
        }
    }

    // No-op for the antichains EOM and leaf produce. A nested `selected`
    // keeps only its outermost clusters.
    let nested: BTreeSet<usize> = result
        .iter()
        .flat_map(|&c| tree.descendants(c).into_iter().skip(1))
        .collect();
    result.retain(|c| !nested.contains(c));
    result
}

/// Selected cluster ids for the given method and epsilon.
pub fn extract_clusters(
    tree: &CondensedTree,
    method: ClusterSelectionMethod,
    epsilon: f64,
) -> BTreeSet<usize> {
    if tree.cluster_rows().next().is_none() {
        return BTreeSet::new();
    }

    let selected = match method {
        ClusterSelectionMethod::Eom => select_eom(tree, &compute_stability(tree)),
        ClusterSelectionMethod::Leaf => select_leaves(tree),
    };

    if epsilon > 0.0 {
        epsilon_search(tree, &selected, epsilon)
    } else {
        selected
    }
}

/// Label each point with the index (in ascending id order) of the selected
/// cluster it belongs to, or -1 when it falls out before reaching one.
pub fn label_points(tree: &CondensedTree, clusters: &BTreeSet<usize>) -> Vec<i32> {
    let root = tree.root();
    let label_of: BTreeMap<usize, i32> = clusters
        .iter()
        .enumerate()
        .map(|(label, &c)| (c, label as i32))
        .collect();

    let mut parent_of = vec![None; tree.cluster_id_bound()];
    for row in &tree.rows {
        parent_of[row.child] = Some(row.parent);
    }

    (0..tree.n_points)
        .map(|point| {
            let mut node = point;
            while let Some(parent) = parent_of[node] {
                if let Some(&label) = label_of.get(&parent) {
                    return label;
                }
                if parent == root {
                    break;
                }
                node = parent;
            }
            -1
        })
        .collect()
}

/// Membership strength: the point's exit lambda relative to the largest
/// lambda directly under its cluster. Noise stays 0.0.
pub fn membership_probabilities(tree: &CondensedTree, clusters: &BTreeSet<usize>, labels: &[i32]) -> Vec<f64> {
    let ordered: Vec<usize> = clusters.iter().copied().collect();
    let mut deaths = vec![0.0f64; tree.cluster_id_bound()];
    for row in &tree.rows {
        deaths[row.parent] = deaths[row.parent].max(row.lambda);
    }

    let mut probabilities = vec![0.0; tree.n_points];
    for row in tree.rows.iter().filter(|r| r.child < tree.n_points) {
        let label = labels[row.child];
        if label < 0 {
            continue;
        }
        let max_lambda = deaths[ordered[label as usize]];
        probabilities[row.child] = if max_lambda <= 0.0 || !row.lambda.is_finite() {
            1.0
        } else {
            row.lambda.min(max_lambda) / max_lambda
        };
    }
    probabilities
}
