//! Tree topology: node layout, the node-count contract, and child indexing.
//!
//! Nodes are stored breadth-first in a dense `Vec<TreeNode>`. `level_start`
//! is the index of the first node at a given level, i.e. the geometric sum
//! `1 + split + split^2 + ... + split^(level-1)`; every other offset in
//! this module is derived from it, which keeps the total node count and
//! the per-node child offset consistent with each other by construction
//! (see DESIGN.md for the resolution of the node-count open question).

use ndarray::Array1;

pub const NO_CHILD: u32 = u32::MAX;

#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    pub level: u32,
    pub level_index: u32,
    pub first_child_index: Option<u32>,
    pub index: u32,
    pub inverted_file_length: u32,
    pub mean: Array1<f32>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.first_child_index.is_none()
    }

    pub(crate) fn placeholder(dim: usize) -> Self {
        Self {
            level: 0,
            level_index: 0,
            first_child_index: None,
            index: 0,
            inverted_file_length: 0,
            mean: Array1::zeros(dim),
        }
    }
}

/// Index of the first node at `level` in the breadth-first layout.
pub fn level_start(split: u32, level: u32) -> u64 {
    if level == 0 {
        0
    } else {
        (u64::from(split).pow(level) - 1) / (u64::from(split) - 1)
    }
}

/// Total node count for a tree of branching factor `split` and `depth` levels.
pub fn number_of_nodes(split: u32, depth: u32) -> u32 {
    level_start(split, depth) as u32
}

/// Number of leaves (nodes at the last level).
pub fn number_of_leaves(split: u32, depth: u32) -> u32 {
    number_of_nodes(split, depth) - number_of_nodes(split, depth - 1)
}

/// Global index of child `c` of a node at `(parent_level, parent_level_index)`.
pub fn child_index(split: u32, parent_level: u32, parent_level_index: u32, c: u32) -> u32 {
    let child_level_index = parent_level_index * split + c;
    level_start(split, parent_level + 1) as u32 + child_level_index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_count_matches_geometric_sum() {
        // K=2, L=3: 1 + 2 + 4 = 7
        assert_eq!(number_of_nodes(2, 3), 7);
        assert_eq!(number_of_leaves(2, 3), 4);

        // K=10, L=6: geometric sum
        let n = number_of_nodes(10, 6);
        assert_eq!(n, 111_111);
        assert_eq!(number_of_leaves(10, 6), 100_000);
    }

    #[test]
    fn minimal_tree_k2_l2() {
        // root + 2 leaves
        assert_eq!(number_of_nodes(2, 2), 3);
        assert_eq!(number_of_leaves(2, 2), 2);
    }

    #[test]
    fn children_of_a_node_share_its_level_plus_one() {
        let split = 3;
        let depth = 4;
        // root is level 0, level_index 0
        for c in 0..split {
            let idx = child_index(split, 0, 0, c);
            // level_start(1) == 1, so children of root are nodes 1,2,3
            assert_eq!(idx, 1 + c);
        }
        // a node at level 1, level_index 1 (node 2 in a split=3 tree)
        for c in 0..split {
            let idx = child_index(split, 1, 1, c);
            assert_eq!(idx, level_start(split, 2) as u32 + split + c);
        }
    }
}
