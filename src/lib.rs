//! Hierarchical vocabulary tree for content-based image retrieval.
//!
//! Given a collection of images' local feature descriptors (SIFT-like,
//! fixed-dimension float vectors, variable count per image), this crate
//! builds a `k`-ary tree of visual words by recursive k-means clustering
//! ([`kmeans`]), quantizes descriptors against that tree ([`quantizer`]),
//! accumulates TF-IDF-weighted image vectors and an inverted file per leaf
//! ([`VocabTree`]), and answers similarity queries with ranked image ids.
//!
//! Descriptor extraction, geometric verification, the dataset/image
//! catalog, and a flat bag-of-words alternative index are all out of
//! scope, this crate only depends on them through the narrow traits in
//! [`dataset`]. `train`/`save`/`load`/`search` are also available behind
//! the [`engine::RetrievalEngine`] trait, for callers who want to swap in
//! another retrieval engine implementing the same shape.

pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod kmeans;
pub mod persist;
pub mod quantizer;
pub mod tree;

mod index;

pub use config::{SearchConfig, TrainConfig};
pub use dataset::{Dataset, DescriptorLoader, Image};
pub use engine::RetrievalEngine;
pub use error::{Result, VocabTreeError};
pub use index::VocabTree;
pub use kmeans::{GreedyKMeans, KMeans, KMeansCriteria};
pub use tree::TreeNode;

/// A dense matrix of descriptors: one row per feature, a fixed number of
/// columns shared across the whole dataset (not hard-coded, discovered
/// from whatever is loaded).
pub type Descriptors = ndarray::Array2<f32>;

/// Vertically stack descriptor matrices that share the same column count.
/// Empty input yields a zero-row matrix.
pub fn merge_descriptors(mats: &[Descriptors]) -> Descriptors {
    let non_empty: Vec<_> = mats.iter().filter(|m| m.nrows() > 0).collect();
    if non_empty.is_empty() {
        return Descriptors::zeros((0, 0));
    }
    let views: Vec<_> = non_empty.iter().map(|m| m.view()).collect();
    ndarray::concatenate(ndarray::Axis(0), &views).expect("mismatched descriptor dimensions")
}

pub(crate) fn l2_normalize(vec: &mut ndarray::Array1<f32>) {
    let norm = vec.dot(vec).sqrt();
    if norm > 0.0 {
        *vec /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn merge_descriptors_stacks_rows() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let b = array![[5.0, 6.0]];
        let merged = merge_descriptors(&[a, b]);
        assert_eq!(merged.shape(), &[3, 2]);
    }

    #[test]
    fn merge_descriptors_empty_input() {
        let merged = merge_descriptors(&[]);
        assert_eq!(merged.nrows(), 0);
    }

    #[test]
    fn l2_normalize_zero_vector_stays_zero() {
        let mut v = ndarray::Array1::<f32>::zeros(4);
        l2_normalize(&mut v);
        assert_eq!(v, ndarray::Array1::<f32>::zeros(4));
    }

    #[test]
    fn l2_normalize_unit_norm() {
        let mut v = array![3.0, 4.0];
        l2_normalize(&mut v);
        assert_approx_eq::assert_approx_eq!((v.dot(&v)).sqrt(), 1.0, 1e-4);
    }
}
