//! Greedy tree descent: assigns a descriptor to a leaf by repeatedly
//! choosing the child whose mean maximizes inner product with the
//! descriptor, recording every node visited along the way.

use std::collections::{HashMap, HashSet};

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::tree::TreeNode;

/// The path a single descriptor took from the root to its assigned leaf.
pub struct VisitPath {
    pub leaf_level_index: usize,
    pub visited: Vec<usize>,
}

/// Walk `descriptor` from the root, choosing at each internal node the
/// child `c` maximizing `descriptor . mean(child c)`, ties broken toward
/// the smallest child index.
pub fn walk(tree: &[TreeNode], split: u32, descriptor: ArrayView1<f32>) -> VisitPath {
    let mut node = 0usize;
    let mut visited = Vec::new();

    loop {
        visited.push(node);
        match tree[node].first_child_index {
            None => {
                return VisitPath {
                    leaf_level_index: tree[node].level_index as usize,
                    visited,
                };
            }
            Some(first_child) => {
                let first_child = first_child as usize;
                let mut best_child = first_child;
                let mut best_score = descriptor.dot(&tree[first_child].mean);
                for c in 1..split as usize {
                    let child = first_child + c;
                    let score = descriptor.dot(&tree[child].mean);
                    if score > best_score {
                        best_score = score;
                        best_child = child;
                    }
                }
                node = best_child;
            }
        }
    }
}

/// Indexing mode: quantize every row of `descriptors`, accumulating a
/// visit-count vector and inserting `image_id` into the inverted file of
/// every leaf reached.
pub fn index_descriptors(
    tree: &[TreeNode],
    split: u32,
    descriptors: ArrayView2<f32>,
    image_id: u64,
    inverted_files: &mut [HashMap<u64, u32>],
) -> Array1<f32> {
    let mut visits = Array1::<f32>::zeros(tree.len());
    for row in descriptors.rows() {
        let path = walk(tree, split, row);
        for &node in &path.visited {
            visits[node] += 1.0;
        }
        *inverted_files[path.leaf_level_index]
            .entry(image_id)
            .or_insert(0) += 1;
    }
    visits
}

/// Query mode: quantize every row of `descriptors`, accumulating a
/// visit-count vector and the union of image ids found in the inverted
/// files of every leaf reached.
pub fn query_descriptors(
    tree: &[TreeNode],
    split: u32,
    descriptors: ArrayView2<f32>,
    inverted_files: &[HashMap<u64, u32>],
) -> (Array1<f32>, HashSet<u64>) {
    let mut visits = Array1::<f32>::zeros(tree.len());
    let mut candidates = HashSet::new();
    for row in descriptors.rows() {
        let path = walk(tree, split, row);
        for &node in &path.visited {
            visits[node] += 1.0;
        }
        candidates.extend(inverted_files[path.leaf_level_index].keys().copied());
    }
    (visits, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{child_index, level_start};
    use ndarray::array;

    fn tiny_tree() -> Vec<TreeNode> {
        // split=2, depth=2: root + 2 leaves, unit axis means.
        let mut tree = vec![TreeNode::placeholder(2); 3];
        tree[0].level = 0;
        tree[0].level_index = 0;
        tree[0].first_child_index = Some(child_index(2, 0, 0, 0));
        for c in 0..2u32 {
            let idx = child_index(2, 0, 0, c) as usize;
            tree[idx].level = 1;
            tree[idx].level_index = c;
            tree[idx].first_child_index = None;
        }
        tree[1].mean = array![1.0, 0.0];
        tree[2].mean = array![0.0, 1.0];
        tree
    }

    #[test]
    fn walk_picks_maximal_inner_product() {
        let tree = tiny_tree();
        let d = array![1.0, 0.0];
        let path = walk(&tree, 2, d.view());
        assert_eq!(path.leaf_level_index, 0);
        assert_eq!(path.visited, vec![0, 1]);

        let d = array![0.0, 1.0];
        let path = walk(&tree, 2, d.view());
        assert_eq!(path.leaf_level_index, 1);
    }

    #[test]
    fn quantization_is_deterministic() {
        let tree = tiny_tree();
        let d = array![0.2, 0.8];
        let p1 = walk(&tree, 2, d.view());
        let p2 = walk(&tree, 2, d.view());
        assert_eq!(p1.leaf_level_index, p2.leaf_level_index);
    }

    #[test]
    fn level_start_sanity() {
        assert_eq!(level_start(2, 0), 0);
        assert_eq!(level_start(2, 1), 1);
    }
}
