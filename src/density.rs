//! Gaussian kernel density estimation and representative-tree selection.
//!
//! The density estimator places one Gaussian kernel on every sample. Kernel
//! covariance is the unbiased sample covariance scaled by Scott's factor
//! `n^(-1/(d+4))` squared:
//!
//! ```text
//! f(x) = 1/n Σᵢ N(x | xᵢ, h² Σ̂)
//! ```
//!
//! A cluster's representative tree is the member sitting at the highest
//! estimated density, i.e. the most "central" structure in feature space.

use crate::error::{Error, Result};
use crate::linalg::{argmax, covariance, CholeskyFactor};
use log::debug;
use ndarray::{Array2, ArrayView2, Axis};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Gaussian kernel density estimate over a fixed sample.
#[derive(Debug, Clone)]
pub struct GaussianKde {
    /// Samples, one per row (n × d).
    dataset: Array2<f64>,
    /// Cholesky factor of the kernel covariance.
    kernel_cholesky: CholeskyFactor,
    /// `ln n + ½ ln det(2π Σ_kernel)`.
    log_norm: f64,
}

impl GaussianKde {
    /// Build an estimator from samples laid out one per row (n × d).
    ///
    /// Returns [`Error::SingularMatrix`] when the sample covariance is singular,
    /// e.g. for collinear or constant samples.
    pub fn new(dataset: ArrayView2<'_, f64>) -> Result<Self> {
        let n = dataset.nrows();
        let d = dataset.ncols();
        if n == 0 || d == 0 {
            return Err(Error::EmptyInput);
        }
        if d > n {
            return Err(Error::InvalidParameter {
                name: "dataset",
                message: "more dimensions than samples",
            });
        }

        let factor = Self::scotts_factor(n, d);
        let kernel_cov = covariance(dataset, 1) * (factor * factor);
        let kernel_cholesky = CholeskyFactor::new(kernel_cov.view())?;
        let log_norm =
            (n as f64).ln() + 0.5 * (d as f64 * LN_2PI + kernel_cholesky.log_det());

        Ok(Self {
            dataset: dataset.to_owned(),
            kernel_cholesky,
            log_norm,
        })
    }

    /// Scott's rule bandwidth factor.
    pub fn scotts_factor(n: usize, d: usize) -> f64 {
        (n as f64).powf(-1.0 / (d as f64 + 4.0))
    }

    /// Estimated density at `point`.
    fn density_at(&self, point: ndarray::ArrayView1<'_, f64>) -> f64 {
        self.dataset
            .outer_iter()
            .map(|sample| {
                let diff = &point - &sample;
                (-0.5 * self.kernel_cholesky.mahalanobis_sq(diff.view()) - self.log_norm).exp()
            })
            .sum()
    }

    /// Evaluate the density at each row of `points` (m × d).
    pub fn evaluate(&self, points: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        if points.ncols() != self.dataset.ncols() {
            return Err(Error::DimensionMismatch {
                expected: self.dataset.ncols(),
                found: points.ncols(),
            });
        }

        #[cfg(feature = "parallel")]
        let densities = (0..points.nrows())
            .into_par_iter()
            .map(|i| self.density_at(points.row(i)))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let densities = points
            .outer_iter()
            .map(|p| self.density_at(p))
            .collect();

        Ok(densities)
    }
}

/// Position (within the member list) of the most representative member.
///
/// `x` and `y` are the members' feature coordinates. If every member sits at
/// the same point the first member is returned. Otherwise a 2-D Gaussian KDE
/// is fitted and the member of highest density wins (first one on ties). When
/// the 2-D kernel covariance is singular the estimate falls back to a 1-D KDE
/// over `x`, evaluated at the `y` values; if that is singular too the error
/// is returned.
pub fn representative_index(x: &[f64], y: &[f64]) -> Result<usize> {
    if x.len() != y.len() {
        return Err(Error::DimensionMismatch {
            expected: x.len(),
            found: y.len(),
        });
    }
    let (Some(&x0), Some(&y0)) = (x.first(), y.first()) else {
        return Err(Error::EmptyInput);
    };
    if x.iter().all(|&v| v == x0) && y.iter().all(|&v| v == y0) {
        return Ok(0);
    }

    let n = x.len();
    let points = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { x[i] } else { y[i] });

    let density = match GaussianKde::new(points.view()) {
        Ok(kde) => kde.evaluate(points.view())?,
        Err(Error::SingularMatrix) => {
            debug!("2-d density is singular for {n} members, falling back to 1-d");
            let xs = points.column(0).insert_axis(Axis(1));
            let ys = points.column(1).insert_axis(Axis(1));
            GaussianKde::new(xs)?.evaluate(ys)?
        }
        Err(e) => return Err(e),
    };

    Ok(argmax(&density))
}
