use serde::{Deserialize, Serialize};

/// Hyper-parameters for [`crate::VocabTree::train`].
///
/// `split` and `depth` fix the shape of the tree (`split` children per
/// internal node, `depth` levels including the root). `max_training_images`
/// optionally bounds how many images from the shuffled training set are
/// actually loaded and merged, which is the "implicit training-subset size
/// bounded by the caller" the engine's contract allows.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub split: u32,
    pub depth: u32,
    pub max_training_images: Option<usize>,
}

impl TrainConfig {
    pub fn new(split: u32, depth: u32) -> Self {
        Self {
            split,
            depth,
            max_training_images: None,
        }
    }

    pub fn with_max_training_images(mut self, max: usize) -> Self {
        self.max_training_images = Some(max);
        self
    }
}

/// Parameters for [`crate::VocabTree::search`].
///
/// `amount_to_return` is accepted for forward compatibility but is not
/// currently used to size the result: the engine always returns the top
/// 10% of the candidate set, a contract inherited unchanged from the
/// original implementation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub amount_to_return: u32,
}

impl SearchConfig {
    pub fn new(amount_to_return: u32) -> Self {
        Self { amount_to_return }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            amount_to_return: 10,
        }
    }
}
