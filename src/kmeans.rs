//! The k-means primitive the tree builder clusters descriptors with.
//!
//! This generalizes the clustering loop `abow`'s `Vocabulary::cluster` ran
//! over Hamming distance between binary descriptors to squared Euclidean
//! distance over dense `f32` feature vectors, with k-means++ seeding in
//! place of the teacher's uniform-random initialization.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cell::RefCell;

/// Termination criterion: stop after `max_iterations` Lloyd steps, or
/// sooner once the total inertia improves by less than `epsilon` between
/// consecutive iterations. Mirrors OpenCV's `COUNT | EPS` criteria.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KMeansCriteria {
    pub max_iterations: u32,
    pub epsilon: f32,
}

impl Default for KMeansCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 16,
            epsilon: 1e-4,
        }
    }
}

/// A k-means clustering primitive: rows in, `k` labels and `k` centroids out.
pub trait KMeans {
    fn cluster(
        &self,
        data: ArrayView2<f32>,
        k: usize,
        criteria: KMeansCriteria,
    ) -> (Vec<u32>, Array2<f32>);
}

/// Single-attempt k-means with k-means++ seeding, the engine's one
/// supported configuration (`attempts = 1` is not a tunable parameter).
pub struct GreedyKMeans {
    rng: RefCell<ChaCha8Rng>,
}

impl GreedyKMeans {
    pub fn new() -> Self {
        Self {
            rng: RefCell::new(ChaCha8Rng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: RefCell::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

impl Default for GreedyKMeans {
    fn default() -> Self {
        Self::new()
    }
}

fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn kmeans_pp_init(data: ArrayView2<f32>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f32> {
    let n = data.nrows();
    let dim = data.ncols();
    let mut centers = Array2::<f32>::zeros((k, dim));

    let first = rng.gen_range(0..n);
    centers.row_mut(0).assign(&data.row(first));

    let mut nearest_sq_dist = vec![f32::INFINITY; n];
    for chosen in 1..k {
        let last_center = centers.row(chosen - 1);
        for i in 0..n {
            let d = squared_distance(data.row(i), last_center);
            if d < nearest_sq_dist[i] {
                nearest_sq_dist[i] = d;
            }
        }
        let total: f32 = nearest_sq_dist.iter().sum();
        let pick = if total <= 0.0 {
            rng.gen_range(0..n)
        } else {
            let mut threshold = rng.gen::<f32>() * total;
            let mut pick = n - 1;
            for (i, &d) in nearest_sq_dist.iter().enumerate() {
                if threshold < d {
                    pick = i;
                    break;
                }
                threshold -= d;
            }
            pick
        };
        centers.row_mut(chosen).assign(&data.row(pick));
    }

    centers
}

impl KMeans for GreedyKMeans {
    fn cluster(
        &self,
        data: ArrayView2<f32>,
        k: usize,
        criteria: KMeansCriteria,
    ) -> (Vec<u32>, Array2<f32>) {
        let n = data.nrows();
        let dim = data.ncols();
        assert!(k > 0, "k must be positive");

        if n == 0 {
            return (Vec::new(), Array2::zeros((k, dim)));
        }

        let mut rng = self.rng.borrow_mut();
        let mut centers = kmeans_pp_init(data, k, &mut rng);
        let mut labels = vec![0u32; n];
        let mut prev_inertia = f32::INFINITY;

        for _ in 0..criteria.max_iterations {
            for i in 0..n {
                let mut best = 0usize;
                let mut best_dist = f32::INFINITY;
                for c in 0..k {
                    let d = squared_distance(data.row(i), centers.row(c));
                    if d < best_dist {
                        best_dist = d;
                        best = c;
                    }
                }
                labels[i] = best as u32;
            }

            let mut sums = Array2::<f32>::zeros((k, dim));
            let mut counts = vec![0u32; k];
            for i in 0..n {
                let c = labels[i] as usize;
                let mut row = sums.row_mut(c);
                row += &data.row(i);
                counts[c] += 1;
            }
            for c in 0..k {
                if counts[c] > 0 {
                    let mean: Array1<f32> = sums.index_axis(Axis(0), c).to_owned() / counts[c] as f32;
                    centers.row_mut(c).assign(&mean);
                }
                // empty clusters keep their previous centroid; the spec
                // tolerates this, zero mass simply flows to the node at
                // scoring/weighting time.
            }

            let inertia: f32 = (0..n)
                .map(|i| squared_distance(data.row(i), centers.row(labels[i] as usize)))
                .sum();
            if (prev_inertia - inertia).abs() < criteria.epsilon {
                break;
            }
            prev_inertia = inertia;
        }

        (labels, centers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn separates_two_obvious_clusters() {
        let data = array![[0.0, 0.0], [0.1, -0.1], [10.0, 10.0], [9.9, 10.1]];
        let km = GreedyKMeans::with_seed(1);
        let (labels, centers) = km.cluster(data.view(), 2, KMeansCriteria::default());
        assert_eq!(centers.shape(), &[2, 2]);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn handles_fewer_points_than_clusters() {
        let data = array![[1.0, 2.0]];
        let km = GreedyKMeans::with_seed(7);
        let (labels, centers) = km.cluster(data.view(), 3, KMeansCriteria::default());
        assert_eq!(labels.len(), 1);
        assert_eq!(centers.nrows(), 3);
    }

    #[test]
    fn empty_input_still_returns_k_centers() {
        let data = Array2::<f32>::zeros((0, 4));
        let km = GreedyKMeans::with_seed(3);
        let (labels, centers) = km.cluster(data.view(), 5, KMeansCriteria::default());
        assert!(labels.is_empty());
        assert_eq!(centers.nrows(), 5);
    }
}
