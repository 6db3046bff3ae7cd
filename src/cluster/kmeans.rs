//! K-means, used to seed mixture fits.
//!
//! Every EM restart starts from hard k-means labels turned into one-hot
//! responsibilities. Seeding is k-means++ (each new center drawn with
//! probability proportional to its squared distance from the nearest chosen
//! center) followed by Lloyd refinement until the centers settle.

use super::traits::Clustering;
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::prelude::*;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Lloyd iteration cap.
const MAX_ITER: usize = 300;
/// Total squared center shift below which refinement stops.
const TOL: f64 = 1e-4;

/// K-means with k-means++ seeding.
#[derive(Debug, Clone)]
pub struct Kmeans {
    k: usize,
    seed: Option<u64>,
}

fn sq_dist(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the closest center (first on ties).
fn closest(point: ArrayView1<'_, f64>, centers: &Array2<f64>) -> usize {
    centers
        .outer_iter()
        .map(|c| sq_dist(point, c))
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best })
        .0
}

fn assign(data: ArrayView2<'_, f64>, centers: &Array2<f64>, labels: &mut [usize]) {
    #[cfg(feature = "parallel")]
    labels
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, label)| *label = closest(data.row(i), centers));

    #[cfg(not(feature = "parallel"))]
    for (i, label) in labels.iter_mut().enumerate() {
        *label = closest(data.row(i), centers);
    }
}

impl Kmeans {
    /// K-means with `k` centers.
    pub fn new(k: usize) -> Self {
        Self { k, seed: None }
    }

    /// Seed the generator used by [`Clustering::fit_predict`].
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn seed_centers(&self, data: ArrayView2<'_, f64>, rng: &mut impl Rng) -> Array2<f64> {
        let n = data.nrows();
        let mut centers = Array2::zeros((self.k, data.ncols()));
        centers.row_mut(0).assign(&data.row(rng.random_range(0..n)));

        // Squared distance of every row to its nearest chosen center so far.
        let mut nearest: Vec<f64> = data
            .outer_iter()
            .map(|p| sq_dist(p, centers.row(0)))
            .collect();

        for c in 1..self.k {
            let total: f64 = nearest.iter().sum();
            let pick = if total > 0.0 {
                let mut remaining = rng.random::<f64>() * total;
                nearest
                    .iter()
                    .position(|&d| {
                        remaining -= d;
                        d > 0.0 && remaining <= 0.0
                    })
                    .unwrap_or(n - 1)
            } else {
                // Every row already sits on a center.
                rng.random_range(0..n)
            };
            centers.row_mut(c).assign(&data.row(pick));

            for (d, p) in nearest.iter_mut().zip(data.outer_iter()) {
                *d = d.min(sq_dist(p, centers.row(c)));
            }
        }
        centers
    }

    /// Hard labels drawn with a caller-owned generator.
    ///
    /// Mixture restarts share one seeded stream so each restart gets a
    /// different seeding.
    pub fn fit_predict_with_rng(
        &self,
        data: ArrayView2<'_, f64>,
        rng: &mut impl Rng,
    ) -> Result<Vec<usize>> {
        let n = data.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if self.k == 0 || self.k > n {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items: n,
            });
        }

        let mut centers = self.seed_centers(data, rng);
        let mut labels = vec![0; n];

        for _ in 0..MAX_ITER {
            assign(data, &centers, &mut labels);

            let mut next = Array2::zeros(centers.raw_dim());
            let mut sizes = vec![0usize; self.k];
            for (point, &label) in data.outer_iter().zip(&labels) {
                let mut row = next.row_mut(label);
                row += &point;
                sizes[label] += 1;
            }
            for (c, mut row) in next.axis_iter_mut(Axis(0)).enumerate() {
                if sizes[c] == 0 {
                    // Empty center jumps to a random row.
                    row.assign(&data.row(rng.random_range(0..n)));
                } else {
                    row /= sizes[c] as f64;
                }
            }

            let shift: f64 = (&next - &centers).mapv(|v| v * v).sum();
            centers = next;
            if shift < TOL {
                break;
            }
        }

        assign(data, &centers, &mut labels);
        Ok(labels)
    }
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        let mut rng: Box<dyn RngCore> = match self.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };
        self.fit_predict_with_rng(data, &mut rng)
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_separates_feature_blobs() {
        let points = array![[0.20, 0.30], [0.21, 0.31], [0.70, 0.60], [0.71, 0.62], [0.19, 0.29]];
        let labels = Kmeans::new(2).with_seed(3).fit_predict(points.view()).unwrap();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[4]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_shared_stream_is_reproducible() {
        let points = Array2::from_shape_fn((30, 2), |(i, j)| ((i * (j + 3)) % 7) as f64 * 0.1);
        let run = || {
            let mut rng = StdRng::seed_from_u64(11);
            let first = Kmeans::new(4).fit_predict_with_rng(points.view(), &mut rng).unwrap();
            let second = Kmeans::new(4).fit_predict_with_rng(points.view(), &mut rng).unwrap();
            (first, second)
        };
        assert_eq!(run(), run());
        assert!(run().0.iter().all(|&l| l < 4));
    }

    #[test]
    fn test_one_center_per_row() {
        let points = array![[0.1, 0.1], [0.5, 0.2], [0.9, 0.8]];
        let mut labels = Kmeans::new(3).with_seed(0).fit_predict(points.view()).unwrap();
        labels.sort_unstable();
        assert_eq!(labels, vec![0, 1, 2]);
    }

    #[test]
    fn test_identical_rows_stay_in_range() {
        let points = array![[0.5, 0.5], [0.5, 0.5], [0.5, 0.5]];
        let labels = Kmeans::new(3).with_seed(7).fit_predict(points.view()).unwrap();
        assert!(labels.iter().all(|&l| l < 3));
    }

    #[test]
    fn test_rejects_bad_counts() {
        let empty = Array2::<f64>::zeros((0, 2));
        assert_eq!(Kmeans::new(2).fit_predict(empty.view()), Err(Error::EmptyInput));

        let two = array![[0.0, 0.0], [1.0, 1.0]];
        assert!(matches!(
            Kmeans::new(5).fit_predict(two.view()),
            Err(Error::InvalidClusterCount { requested: 5, n_items: 2 })
        ));
        assert!(matches!(
            Kmeans::new(0).fit_predict(two.view()),
            Err(Error::InvalidClusterCount { .. })
        ));
    }
}
