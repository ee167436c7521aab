//! The vocabulary tree index itself: training (C1 + C3's database-side
//! accumulation), and query-time scoring (C3's search operation).

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::dataset::{Dataset, DescriptorLoader};
use crate::error::Result;
use crate::kmeans::{KMeans, KMeansCriteria};
use crate::quantizer;
use crate::tree::{self, TreeNode};
use crate::{l2_normalize, Descriptors, SearchConfig, TrainConfig};

/// A trained hierarchical vocabulary tree: topology, TF-IDF weights, the
/// per-image database vectors, and the inverted file per leaf.
///
/// Produced once by [`VocabTree::train`], written by [`VocabTree::save`],
/// read back by [`VocabTree::load`], and read-only thereafter. Every
/// method that only reads (`search`, the accessors) takes `&self`, so a
/// trained tree is `Send + Sync` and safe to query concurrently from
/// multiple threads (the crate itself never spawns any).
#[derive(Clone, Debug, PartialEq)]
pub struct VocabTree {
    pub(crate) split: u32,
    pub(crate) max_level: u32,
    pub(crate) tree: Vec<TreeNode>,
    pub(crate) weights: ndarray::Array1<f32>,
    pub(crate) database_vectors: HashMap<u64, ndarray::Array1<f32>>,
    pub(crate) inverted_files: Vec<HashMap<u64, u32>>,
}

impl VocabTree {
    pub fn split(&self) -> u32 {
        self.split
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    pub fn number_of_nodes(&self) -> u32 {
        self.tree.len() as u32
    }

    pub fn database_len(&self) -> usize {
        self.database_vectors.len()
    }

    pub fn contains_image(&self, id: u64) -> bool {
        self.database_vectors.contains_key(&id)
    }

    /// Train a fresh index from a candidate set of training image ids.
    ///
    /// Images without a descriptor file, or whose descriptor matrix fails
    /// to load, are skipped silently and simply shrink the effective
    /// training set. Fails only on I/O errors the descriptor loader
    /// decides are not recoverable (it should return `Ok` with an empty
    /// matrix, or swallow the error itself, for merely-missing images).
    pub fn train(
        dataset: &dyn Dataset,
        loader: &dyn DescriptorLoader,
        kmeans: &dyn KMeans,
        image_ids: &[u64],
        config: &TrainConfig,
    ) -> Result<Self> {
        let split = config.split;
        let max_level = config.depth;
        assert!(split >= 2, "split must be at least 2");
        assert!(max_level >= 2, "depth must be at least 2 (root + leaves)");

        let mut shuffled_ids = image_ids.to_vec();
        let mut rng = ChaCha8Rng::from_entropy();
        shuffled_ids.shuffle(&mut rng);
        if let Some(max) = config.max_training_images {
            shuffled_ids.truncate(max);
        }

        let mut kept_ids = Vec::with_capacity(shuffled_ids.len());
        let mut matrices = Vec::with_capacity(shuffled_ids.len());
        for id in shuffled_ids {
            let Some(image) = dataset.image(id) else {
                continue;
            };
            let path = dataset.location(&image.feature_path("descriptors"));
            match loader.load(&path) {
                Ok(descriptors) if descriptors.nrows() > 0 => {
                    kept_ids.push(id);
                    matrices.push(descriptors);
                }
                _ => continue,
            }
        }

        log::info!(
            "training vocabulary tree: {} images kept out of {} candidates",
            kept_ids.len(),
            image_ids.len()
        );
        assert!(
            !kept_ids.is_empty(),
            "training requires at least one image with descriptors"
        );

        let merged = crate::merge_descriptors(&matrices);
        let dim = merged.ncols();

        let number_of_nodes = tree::number_of_nodes(split, max_level) as usize;
        let number_of_leaves = tree::number_of_leaves(split, max_level) as usize;

        let mut nodes: Vec<TreeNode> = (0..number_of_nodes)
            .map(|_| TreeNode::placeholder(dim))
            .collect();
        nodes[0].level = 0;
        nodes[0].level_index = 0;
        nodes[0].index = 0;

        let criteria = KMeansCriteria::default();
        build_subtree(&mut nodes, 0, merged.view(), split, max_level, kmeans, criteria);

        let mut inverted_files = vec![HashMap::new(); number_of_leaves];
        let mut database_vectors = HashMap::with_capacity(kept_ids.len());
        let mut document_frequency = vec![0u32; number_of_nodes];

        for (id, descriptors) in kept_ids.iter().zip(matrices.iter()) {
            let visits = quantizer::index_descriptors(
                &nodes,
                split,
                descriptors.view(),
                *id,
                &mut inverted_files,
            );
            for (n, &count) in visits.iter().enumerate() {
                if count > 0.0 {
                    document_frequency[n] += 1;
                }
            }
            database_vectors.insert(*id, visits);
        }

        let training_set_size = kept_ids.len() as f32;
        let weights: ndarray::Array1<f32> = document_frequency
            .iter()
            .map(|&df| {
                // A node with zero document frequency (an empty k-means
                // group, or a single-image training set's never-repeated
                // nodes) has `ln(0) = -inf`, which then multiplies the
                // guaranteed-zero visit count at that index and produces
                // `NaN` instead of `0.0`. Mask it: such nodes carry zero
                // mass at scoring time regardless, so the weight may as
                // well be zero too.
                if df == 0 {
                    0.0
                } else {
                    (df as f32 / training_set_size).ln()
                }
            })
            .collect();

        for vector in database_vectors.values_mut() {
            *vector *= &weights;
            l2_normalize(vector);
        }

        log::debug!(
            "built tree with {} nodes ({} leaves) over {} training images",
            number_of_nodes,
            number_of_leaves,
            kept_ids.len()
        );

        Ok(Self {
            split,
            max_level,
            tree: nodes,
            weights,
            database_vectors,
            inverted_files,
        })
    }

    /// Build the TF-IDF-weighted, L2-normalized vector for a descriptor
    /// matrix without touching the inverted files or candidate set. This
    /// is the building block `search` uses for the query side; exposed
    /// directly for callers who only need a vector (e.g. to compare two
    /// ad hoc descriptor sets).
    pub fn make_vector(&self, descriptors: &Descriptors, weighted: bool) -> ndarray::Array1<f32> {
        let (mut visits, _) =
            quantizer::query_descriptors(&self.tree, self.split, descriptors.view(), &self.inverted_files);
        if weighted {
            visits *= &self.weights;
            l2_normalize(&mut visits);
        }
        visits
    }

    /// Rank database images by similarity to `query_descriptors`.
    ///
    /// Returns the empty list if the query matrix is empty or no database
    /// image shares a visual word with it. This is the documented
    /// `EmptyResult` condition, not an error.
    pub fn search(&self, query_descriptors: &Descriptors, _params: &SearchConfig) -> Vec<u64> {
        if query_descriptors.nrows() == 0 {
            return Vec::new();
        }

        let (mut query_vector, candidates) = quantizer::query_descriptors(
            &self.tree,
            self.split,
            query_descriptors.view(),
            &self.inverted_files,
        );
        query_vector *= &self.weights;
        l2_normalize(&mut query_vector);

        let mut scored: Vec<(u64, f32)> = candidates
            .into_iter()
            .map(|id| {
                let db_vector = &self.database_vectors[&id];
                // Absolute-value-per-term L1 score: the documented
                // contract this engine inherits (see DESIGN.md).
                let score: f32 = query_vector
                    .iter()
                    .zip(db_vector.iter())
                    .map(|(q, d)| (q * d).abs())
                    .sum();
                (id, score)
            })
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        let take = (scored.len() as f32 / 10.0).ceil() as usize;
        scored.into_iter().take(take).map(|(id, _)| id).collect()
    }
}

/// Recursively partitions `descriptors` at node `t` using `kmeans`,
/// writing centroids and topology directly into `nodes` by index, the
/// same "write through a shared mutable array by computed index" style
/// the original tree-building recursion used, rather than building a
/// fresh tree bottom-up.
fn build_subtree(
    nodes: &mut [TreeNode],
    t: usize,
    descriptors: ndarray::ArrayView2<f32>,
    split: u32,
    max_level: u32,
    kmeans: &dyn KMeans,
    criteria: KMeansCriteria,
) {
    let level = nodes[t].level;
    if level == max_level - 1 {
        nodes[t].first_child_index = None;
        return;
    }

    let (labels, centers) = kmeans.cluster(descriptors, split as usize, criteria);

    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); split as usize];
    for (row, &label) in labels.iter().enumerate() {
        groups[label as usize].push(row);
    }

    let level_index = nodes[t].level_index;
    let first_child = tree::child_index(split, level, level_index, 0);
    nodes[t].first_child_index = Some(first_child);

    for c in 0..split {
        let child = tree::child_index(split, level, level_index, c) as usize;
        nodes[child].level = level + 1;
        nodes[child].level_index = level_index * split + c;
        nodes[child].index = child as u32;
        nodes[child].mean = centers.row(c as usize).to_owned();
    }

    for c in 0..split {
        let child = tree::child_index(split, level, level_index, c) as usize;
        let group = &groups[c as usize];
        let child_descriptors = descriptors.select(ndarray::Axis(0), group);
        build_subtree(
            nodes,
            child,
            child_descriptors.view(),
            split,
            max_level,
            kmeans,
            criteria,
        );
    }
}
