//! Hierarchy construction for HDBSCAN.
//!
//! Core distances → mutual reachability MST (Prim) → single-linkage
//! dendrogram → condensed tree.
//!
//! Node ids follow the usual convention: `0..n` are points, `n..2n-1` are
//! dendrogram merges. In the condensed tree, cluster ids start at `n` (the
//! root) and grow in creation order.

use std::collections::VecDeque;

use crate::matrix::FeatureMatrix;
use crate::metric::DistanceMetric;

/// Edge of the minimum spanning tree: (point_a, point_b, mutual reachability).
pub type MstEdge = (usize, usize, f64);

/// One merge of the single-linkage dendrogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkageRow {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

/// One edge of the condensed tree.
///
/// `child` is a point id (`< n_points`, `child_size == 1`) or a cluster id
/// (`>= n_points`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CondensedRow {
    pub parent: usize,
    pub child: usize,
    pub lambda: f64,
    pub child_size: usize,
}

/// Condensed cluster hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct CondensedTree {
    pub n_points: usize,
    pub rows: Vec<CondensedRow>,
}

impl CondensedTree {
    /// Root cluster id (always `n_points`).
    #[inline]
    pub fn root(&self) -> usize {
        self.n_points
    }

    /// Rows whose child is a cluster.
    pub fn cluster_rows(&self) -> impl Iterator<Item = &CondensedRow> {
        self.rows.iter().filter(|r| r.child_size > 1)
    }

    /// One past the largest cluster id in the tree.
    pub fn cluster_id_bound(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.parent.max(r.child) + 1)
            .max()
            .unwrap_or(self.n_points + 1)
            .max(self.n_points + 1)
    }

    /// Lambda at which `cluster` was born, `None` for the root.
    pub fn birth_lambda(&self, cluster: usize) -> Option<f64> {
        self.cluster_rows()
            .find(|r| r.child == cluster)
            .map(|r| r.lambda)
    }

    /// Parent of `cluster`, `None` for the root.
    pub fn parent_of(&self, cluster: usize) -> Option<usize> {
        self.cluster_rows()
            .find(|r| r.child == cluster)
            .map(|r| r.parent)
    }

    /// Direct child clusters of `cluster`, in creation order.
    pub fn child_clusters(&self, cluster: usize) -> Vec<usize> {
        self.cluster_rows()
            .filter(|r| r.parent == cluster)
            .map(|r| r.child)
            .collect()
    }

    /// `cluster` and all its descendant clusters, breadth first.
    pub fn descendants(&self, cluster: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([cluster]);
        while let Some(c) = queue.pop_front() {
            out.push(c);
            queue.extend(self.child_clusters(c));
        }
        out
    }
}

/// Lambda (inverse distance) of a merge distance, kept finite.
///
/// A zero distance maps to `f64::MAX` so stabilities never see `inf - inf`.
#[inline]
pub fn lambda_of(distance: f64) -> f64 {
    if distance > 0.0 {
        (1.0 / distance).min(f64::MAX)
    } else {
        f64::MAX
    }
}

/// Distance to the `min_samples`-th nearest other point, clamped to `n - 1`.
pub fn core_distances(matrix: &FeatureMatrix, min_samples: usize, metric: DistanceMetric) -> Vec<f64> {
    let n = matrix.n_rows();
    if n < 2 {
        return vec![0.0; n];
    }
    let k = min_samples.clamp(1, n - 1);

    (0..n)
        .map(|i| {
            let mut distances: Vec<f64> = (0..n)
                .filter(|&j| j != i)
                .map(|j| metric.distance(matrix.row(i), matrix.row(j)))
                .collect();
            distances.sort_by(f64::total_cmp);
            distances[k - 1]
        })
        .collect()
}

/// Minimum spanning tree of the mutual reachability graph.
///
/// MR(a,b) = max(core(a), core(b), dist(a,b)). Prim's algorithm over the
/// implicit dense graph, starting at point 0; ties go to the lowest index.
/// Edges are returned sorted by weight (stable, so Prim order breaks ties).
pub fn mutual_reachability_mst(
    matrix: &FeatureMatrix,
    core: &[f64],
    metric: DistanceMetric,
) -> Vec<MstEdge> {
    let n = matrix.n_rows();
    if n < 2 {
        return Vec::new();
    }

    let mut in_tree = vec![false; n];
    let mut min_dist = vec![f64::INFINITY; n];
    let mut min_edge = vec![0usize; n];
    let mut edges = Vec::with_capacity(n - 1);

    let mut current = 0;
    for _ in 1..n {
        in_tree[current] = true;

        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let d = metric
                .distance(matrix.row(current), matrix.row(j))
                .max(core[current])
                .max(core[j]);
            if d < min_dist[j] {
                min_dist[j] = d;
                min_edge[j] = current;
            }
        }

        let mut next = usize::MAX;
        let mut best = f64::INFINITY;
        for j in 0..n {
            if !in_tree[j] && (next == usize::MAX || min_dist[j] < best) {
                best = min_dist[j];
                next = j;
            }
        }

        edges.push((min_edge[next], next, best));
        current = next;
    }

    edges.sort_by(|a, b| a.2.total_cmp(&b.2));
    edges
}

/// Union-find over dendrogram node ids; roots are always the newest merge.
struct LinkageUnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    next_label: usize,
}

impl LinkageUnionFind {
    fn new(n_points: usize) -> Self {
        let total = 2 * n_points - 1;
        let mut size = vec![0; total];
        size[..n_points].fill(1);
        Self {
            parent: (0..total).collect(),
            size,
            next_label: n_points,
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) -> usize {
        let label = self.next_label;
        self.parent[a] = label;
        self.parent[b] = label;
        self.size[label] = self.size[a] + self.size[b];
        self.next_label += 1;
        self.size[label]
    }
}

/// Single-linkage dendrogram from weight-sorted MST edges.
///
/// Row `r` creates node `n_points + r`.
pub fn single_linkage(mst: &[MstEdge], n_points: usize) -> Vec<LinkageRow> {
    if n_points < 2 {
        return Vec::new();
    }
    let mut uf = LinkageUnionFind::new(n_points);
    let mut rows = Vec::with_capacity(mst.len());

    for &(a, b, distance) in mst {
        let left = uf.find(a);
        let right = uf.find(b);
        let size = uf.union(left, right);
        rows.push(LinkageRow {
            left,
            right,
            distance,
            size,
        });
    }
    rows
}

/// Breadth-first node ids of the dendrogram subtree rooted at `start`.
fn bfs_linkage(linkage: &[LinkageRow], start: usize, n_points: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        out.push(node);
        if node >= n_points {
            let row = linkage[node - n_points];
            queue.push_back(row.left);
            queue.push_back(row.right);
        }
    }
    out
}

/// Condense the dendrogram: splits where both sides have at least
/// `min_cluster_size` points create two new clusters; smaller sides are
/// recorded as points falling out of the parent cluster.
pub fn condense_tree(linkage: &[LinkageRow], n_points: usize, min_cluster_size: usize) -> CondensedTree {
    let mut rows = Vec::new();
    if n_points < 2 || linkage.is_empty() {
        return CondensedTree { n_points, rows };
    }

    let root = 2 * n_points - 2;
    let mut relabel = vec![0usize; root + 1];
    let mut ignore = vec![false; root + 1];
    relabel[root] = n_points;
    let mut next_label = n_points + 1;

    let node_size = |node: usize| -> usize {
        if node >= n_points {
            linkage[node - n_points].size
        } else {
            1
        }
    };

    for node in bfs_linkage(linkage, root, n_points) {
        if ignore[node] || node < n_points {
            continue;
        }

        let row = linkage[node - n_points];
        let lambda = lambda_of(row.distance);
        let parent = relabel[node];
        let left_count = node_size(row.left);
        let right_count = node_size(row.right);

        let fall_out = |side: usize, rows: &mut Vec<CondensedRow>, ignore: &mut [bool]| {
            for sub in bfs_linkage(linkage, side, n_points) {
                if sub < n_points {
                    rows.push(CondensedRow {
                        parent,
                        child: sub,
                        lambda,
                        child_size: 1,
                    });
                }
                ignore[sub] = true;
            }
        };

        match (left_count >= min_cluster_size, right_count >= min_cluster_size) {
            (true, true) => {
                for (side, count) in [(row.left, left_count), (row.right, right_count)] {
                    relabel[side] = next_label;
                    rows.push(CondensedRow {
                        parent,
                        child: next_label,
                        lambda,
                        child_size: count,
                    });
                    next_label += 1;
                }
            }
            (false, false) => {
                fall_out(row.left, &mut rows, &mut ignore);
                fall_out(row.right, &mut rows, &mut ignore);
            }
            (false, true) => {
                relabel[row.right] = parent;
                fall_out(row.left, &mut rows, &mut ignore);
            }
            (true, false) => {
                relabel[row.left] = parent;
                fall_out(row.right, &mut rows, &mut ignore);
            }
        }
    }

    CondensedTree { n_points, rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[f64]) -> FeatureMatrix {
        FeatureMatrix::from_rows(
            vec!["x".into()],
            points.iter().map(|&p| vec![p]).collect(),
        )
        .expect("matrix")
    }

    #[test]
    fn test_core_distance_excludes_self() {
        let m = line(&[0.0, 1.0, 3.0, 6.0]);
        let core = core_distances(&m, 1, DistanceMetric::Euclidean);
        assert_eq!(core, vec![1.0, 1.0, 2.0, 3.0]);

        let core = core_distances(&m, 2, DistanceMetric::Euclidean);
        assert_eq!(core, vec![3.0, 2.0, 3.0, 5.0]);
    }

    #[test]
    fn test_core_distance_clamps_to_available_points() {
        let m = line(&[0.0, 1.0, 3.0]);
        let core = core_distances(&m, 10, DistanceMetric::Euclidean);
        assert_eq!(core, vec![3.0, 2.0, 3.0]);
    }

    #[test]
    fn test_mst_has_n_minus_1_sorted_edges() {
        let m = line(&[0.0, 1.0, 3.0, 6.0, 10.0]);
        let core = vec![0.0; 5];
        let mst = mutual_reachability_mst(&m, &core, DistanceMetric::Euclidean);
        assert_eq!(mst.len(), 4);
        let weights: Vec<f64> = mst.iter().map(|e| e.2).collect();
        assert_eq!(weights, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_mst_uses_mutual_reachability() {
        let m = line(&[0.0, 1.0, 2.0]);
        let core = vec![5.0, 0.0, 0.0];
        let mst = mutual_reachability_mst(&m, &core, DistanceMetric::Euclidean);
        let weights: Vec<f64> = mst.iter().map(|e| e.2).collect();
        assert_eq!(weights, vec![1.0, 5.0]);
    }

    #[test]
    fn test_single_linkage_sizes_accumulate() {
        let mst = vec![(0, 1, 1.0), (2, 3, 1.0), (1, 2, 5.0)];
        let linkage = single_linkage(&mst, 4);
        assert_eq!(linkage.len(), 3);
        assert_eq!(linkage[0], LinkageRow { left: 0, right: 1, distance: 1.0, size: 2 });
        assert_eq!(linkage[1], LinkageRow { left: 2, right: 3, distance: 1.0, size: 2 });
        assert_eq!(linkage[2], LinkageRow { left: 4, right: 5, distance: 5.0, size: 4 });
    }

    #[test]
    fn test_condense_splits_two_groups() {
        // Two groups of three separated by a long edge.
        let mst = vec![
            (0, 1, 1.0),
            (1, 2, 1.0),
            (3, 4, 1.0),
            (4, 5, 1.0),
            (2, 3, 10.0),
        ];
        let linkage = single_linkage(&mst, 6);
        let tree = condense_tree(&linkage, 6, 3);

        let clusters = tree.child_clusters(tree.root());
        assert_eq!(clusters, vec![7, 8]);
        assert_eq!(tree.birth_lambda(7), Some(0.1));

        let points_in = |c: usize| tree.rows.iter().filter(|r| r.parent == c && r.child_size == 1).count();
        assert_eq!(points_in(7) + points_in(8), 6);
        assert_eq!(points_in(tree.root()), 0);
        assert_eq!(tree.descendants(tree.root()), vec![6, 7, 8]);
    }

    #[test]
    fn test_condense_small_side_falls_out_of_parent() {
        let mst = vec![(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0), (3, 4, 8.0)];
        let linkage = single_linkage(&mst, 5);
        let tree = condense_tree(&linkage, 5, 3);

        assert!(tree.child_clusters(tree.root()).is_empty());
        let outlier = tree.rows.iter().find(|r| r.child == 4).expect("point 4");
        assert_eq!(outlier.parent, tree.root());
        assert_eq!(outlier.lambda, 1.0 / 8.0);
        assert_eq!(tree.rows.len(), 5);
    }

    #[test]
    fn test_zero_distance_lambda_is_finite() {
        assert_eq!(lambda_of(0.0), f64::MAX);
        assert_eq!(lambda_of(2.0), 0.5);
        assert!(lambda_of(f64::MIN_POSITIVE / 4.0).is_finite());
    }
}
