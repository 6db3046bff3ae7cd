//! Dense linear-algebra helpers shared by the mixture models and the density estimator.
//!
//! Factorizations go through `faer`; data stays in `ndarray` everywhere else.

use crate::error::{Error, Result};
use faer::linalg::triangular_solve::solve_lower_triangular_in_place;
use faer::{Mat, Parallelism, Side};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

fn to_faer(a: ArrayView2<'_, f64>) -> Mat<f64> {
    Mat::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Lower Cholesky factor `L` of a positive definite matrix, `A = L Lᵀ`.
#[derive(Debug, Clone)]
pub(crate) struct CholeskyFactor {
    l: Mat<f64>,
}

impl CholeskyFactor {
    /// Factor `a`.
    ///
    /// Fails with [`Error::SingularMatrix`] when the factorization breaks down
    /// or a pivot is not clearly positive relative to the diagonal scale, which
    /// covers singular, indefinite and NaN-contaminated inputs.
    pub(crate) fn new(a: ArrayView2<'_, f64>) -> Result<Self> {
        let d = a.nrows();
        if a.ncols() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: a.ncols(),
            });
        }

        let llt = to_faer(a)
            .cholesky(Side::Lower)
            .map_err(|_| Error::SingularMatrix)?;
        let l = llt.compute_l();

        let scale = (0..d).map(|i| a[[i, i]].abs()).fold(0.0, f64::max);
        let tol = 4.0 * f64::EPSILON * d as f64 * scale;
        // Negated comparison so NaN also fails.
        if (0..d).any(|j| !(l[(j, j)] * l[(j, j)] > tol)) {
            return Err(Error::SingularMatrix);
        }

        Ok(Self { l })
    }

    /// `ln det A`.
    pub(crate) fn log_det(&self) -> f64 {
        2.0 * (0..self.l.nrows()).map(|i| self.l[(i, i)].ln()).sum::<f64>()
    }

    /// Squared Mahalanobis norm `diffᵀ A⁻¹ diff`, via `L z = diff`.
    pub(crate) fn mahalanobis_sq(&self, diff: ArrayView1<'_, f64>) -> f64 {
        let mut z = Mat::from_fn(diff.len(), 1, |i, _| diff[i]);
        solve_lower_triangular_in_place(self.l.as_ref(), z.as_mut(), Parallelism::None);
        (0..z.nrows()).map(|i| z[(i, 0)] * z[(i, 0)]).sum()
    }

    /// The factor as an `ndarray` matrix.
    #[cfg(test)]
    fn lower(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.l.nrows(), self.l.ncols()), |(i, j)| self.l[(i, j)])
    }
}

/// Sample covariance of the rows of `data` (n × d) with `ddof` degrees of freedom removed.
pub(crate) fn covariance(data: ArrayView2<'_, f64>, ddof: usize) -> Array2<f64> {
    let n = data.nrows();
    let d = data.ncols();
    let mut cov = Array2::zeros((d, d));
    if n <= ddof {
        return cov;
    }

    let mean = data.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(d));
    for row in data.outer_iter() {
        for a in 0..d {
            let da = row[a] - mean[a];
            for b in a..d {
                cov[[a, b]] += da * (row[b] - mean[b]);
            }
        }
    }

    let denom = (n - ddof) as f64;
    for a in 0..d {
        for b in a..d {
            cov[[a, b]] /= denom;
            cov[[b, a]] = cov[[a, b]];
        }
    }
    cov
}

/// Eigendecomposition of a symmetric 2×2 matrix.
///
/// Returns the eigenvalues and matching unit eigenvectors (`vectors[i]`
/// belongs to `values[i]`) in the order `faer` reports them; callers that
/// care about ordering sort explicitly.
pub(crate) fn symmetric_eigen_2x2(m: [[f64; 2]; 2]) -> ([f64; 2], [[f64; 2]; 2]) {
    let off = 0.5 * (m[0][1] + m[1][0]);
    let a = Mat::from_fn(2, 2, |i, j| if i == j { m[i][i] } else { off });
    let eig = a.selfadjoint_eigendecomposition(Side::Lower);
    let s = eig.s().column_vector();
    let u = eig.u();
    (
        [s.read(0), s.read(1)],
        [[u[(0, 0)], u[(1, 0)]], [u[(0, 1)], u[(1, 1)]]],
    )
}

/// Log-sum-exp for numerical stability.
pub(crate) fn logsumexp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }
    max_val
        + values
            .iter()
            .map(|&v| (v - max_val).exp())
            .sum::<f64>()
            .ln()
}

/// Index of the first maximal element (NaNs never win).
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}
