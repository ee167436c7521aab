#![feature(test)]
extern crate test;
use test::Bencher;

use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use vocabtree::dataset::{Dataset, DescriptorLoader, Image};
use vocabtree::{Descriptors, GreedyKMeans, SearchConfig, TrainConfig, VocabTree};

struct RandomDataset {
    descriptors: HashMap<u64, Descriptors>,
}

impl RandomDataset {
    fn new(num_images: usize, descriptors_per_image: usize, dim: usize) -> (Self, Vec<u64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let mut descriptors = HashMap::with_capacity(num_images);
        let ids: Vec<u64> = (0..num_images as u64).collect();
        for &id in &ids {
            let rows: Vec<f32> = (0..descriptors_per_image * dim)
                .map(|_| rng.gen::<f32>())
                .collect();
            let mat = Array2::from_shape_vec((descriptors_per_image, dim), rows).unwrap();
            descriptors.insert(id, mat);
        }
        (Self { descriptors }, ids)
    }
}

impl Dataset for RandomDataset {
    fn image(&self, id: u64) -> Option<Image> {
        self.descriptors
            .contains_key(&id)
            .then(|| Image::new(id, format!("bench/{}", id)))
    }

    fn location(&self, relative_path: &Path) -> PathBuf {
        relative_path.to_path_buf()
    }
}

impl DescriptorLoader for RandomDataset {
    fn load(&self, path: &Path) -> std::io::Result<Descriptors> {
        let id: u64 = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .and_then(|s| s.parse().ok())
            .expect("bench feature paths always embed the image id");
        self.descriptors
            .get(&id)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no descriptors"))
    }
}

fn trained_index() -> (VocabTree, Descriptors) {
    let (dataset, ids) = RandomDataset::new(200, 64, 128);
    let kmeans = GreedyKMeans::with_seed(11);
    let config = TrainConfig::new(10, 4);
    let voc = VocabTree::train(&dataset, &dataset, &kmeans, &ids, &config).unwrap();
    let query = dataset.descriptors.get(&ids[0]).unwrap().clone();
    (voc, query)
}

/// Benchmark for `VocabTree::search()`.
#[bench]
fn search(b: &mut Bencher) {
    let (voc, query) = trained_index();
    b.iter(|| voc.search(&query, &SearchConfig::default()));
}

/// Benchmark for `VocabTree::make_vector()`.
#[bench]
fn make_vector(b: &mut Bencher) {
    let (voc, query) = trained_index();
    b.iter(|| voc.make_vector(&query, true));
}
