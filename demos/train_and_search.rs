//! Train a tiny vocabulary tree over a handful of synthetic descriptors,
//! save it, load it back, and run a query. Illustrates the supported
//! lifecycle: train -> save -> load -> search.

use ndarray::array;
use vocabtree::dataset::{Dataset, DescriptorLoader, Image};
use vocabtree::{Descriptors, GreedyKMeans, SearchConfig, TrainConfig, VocabTree};

struct ToyDataset {
    descriptors: Vec<(u64, Descriptors)>,
}

impl Dataset for ToyDataset {
    fn image(&self, id: u64) -> Option<Image> {
        self.descriptors
            .iter()
            .any(|(i, _)| *i == id)
            .then(|| Image::new(id, format!("toy/{}", id)))
    }

    fn location(&self, relative_path: &std::path::Path) -> std::path::PathBuf {
        relative_path.to_path_buf()
    }
}

impl DescriptorLoader for ToyDataset {
    fn load(&self, path: &std::path::Path) -> std::io::Result<Descriptors> {
        let id: u64 = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .and_then(|s| s.parse().ok())
            .expect("toy feature paths always embed the image id");
        self.descriptors
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, d)| d.clone())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no descriptors"))
    }
}

fn main() {
    env_logger::init();

    let dataset = ToyDataset {
        descriptors: vec![
            (0, array![[1.0, 0.0], [0.9, 0.1]]),
            (1, array![[-1.0, 0.0], [-0.9, -0.1]]),
            (2, array![[0.0, 1.0]]),
            (3, array![[0.0, -1.0]]),
        ],
    };
    let ids: Vec<u64> = dataset.descriptors.iter().map(|(id, _)| *id).collect();

    let kmeans = GreedyKMeans::with_seed(7);
    let config = TrainConfig::new(2, 3);
    let index = VocabTree::train(&dataset, &dataset, &kmeans, &ids, &config)
        .expect("training over in-memory descriptors cannot fail on i/o");

    let tmp = std::env::temp_dir().join("vocabtree-demo.bin");
    index.save(&tmp).expect("save");
    let loaded = VocabTree::load(&tmp).expect("load");

    let query = array![[1.0, 0.0]];
    let matches = loaded.search(&query, &SearchConfig::default());
    println!("query (1, 0) matched images: {:?}", matches);
}
