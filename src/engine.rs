//! The retrieval-engine capability: train/save/load/search expressed as a
//! trait instead of a concrete type, so an embedder can swap in another
//! implementation (e.g. a flat inverted index) behind the same shape
//! without inheritance.

use std::path::Path;

use crate::dataset::{Dataset, DescriptorLoader};
use crate::error::Result;
use crate::kmeans::KMeans;
use crate::{Descriptors, SearchConfig, TrainConfig};

/// Anything that can train a database from a set of images, persist it, and
/// rank database images against a query's descriptors.
///
/// [`crate::VocabTree`] is the only implementation this crate ships, but the
/// trait is the seam a flat bag-of-words index (out of scope here) would
/// plug into without either type knowing about the other.
pub trait RetrievalEngine: Sized {
    fn train(
        dataset: &dyn Dataset,
        loader: &dyn DescriptorLoader,
        kmeans: &dyn KMeans,
        image_ids: &[u64],
        config: &TrainConfig,
    ) -> Result<Self>;

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()>;

    fn load<P: AsRef<Path>>(path: P) -> Result<Self>;

    fn search(&self, query_descriptors: &Descriptors, params: &SearchConfig) -> Vec<u64>;
}

impl RetrievalEngine for crate::VocabTree {
    fn train(
        dataset: &dyn Dataset,
        loader: &dyn DescriptorLoader,
        kmeans: &dyn KMeans,
        image_ids: &[u64],
        config: &TrainConfig,
    ) -> Result<Self> {
        crate::VocabTree::train(dataset, loader, kmeans, image_ids, config)
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        crate::VocabTree::save(self, path)
    }

    fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::VocabTree::load(path)
    }

    fn search(&self, query_descriptors: &Descriptors, params: &SearchConfig) -> Vec<u64> {
        crate::VocabTree::search(self, query_descriptors, params)
    }
}
