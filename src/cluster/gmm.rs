//! Gaussian Mixture Model clustering with full covariance matrices.
//!
//! GMM provides **soft clustering** with probabilistic assignments,
//! allowing items to belong to multiple clusters with different probabilities.
//!
//! # The Probabilistic Model
//!
//! ```text
//! P(x) = Σₖ πₖ × N(x | μₖ, Σₖ)
//! ```
//!
//! Where:
//! - πₖ = mixing weight (probability of cluster k)
//! - μₖ = mean of cluster k
//! - Σₖ = full covariance matrix of cluster k
//!
//! # The EM Algorithm
//!
//! **E-step**: Compute "responsibilities" (soft assignments):
//! ```text
//! γₙₖ = πₖ × N(xₙ | μₖ, Σₖ) / Σⱼ πⱼ × N(xₙ | μⱼ, Σⱼ)
//! ```
//!
//! **M-step**: Update parameters using responsibilities:
//! - Nₖ = Σₙ γₙₖ
//! - μₖ = Σₙ γₙₖ xₙ / Nₖ
//! - Σₖ = Σₙ γₙₖ (xₙ - μₖ)(xₙ - μₖ)ᵀ / Nₖ + reg·I
//! - πₖ = Nₖ / N
//!
//! Iteration stops once the mean log-likelihood changes by less than `tol`.
//!
//! # Model Selection
//!
//! [`FittedGaussianMixture::bic`] gives the Bayesian Information Criterion
//!
//! ```text
//! BIC = -2 · N · mean_loglik + p · ln N,   p = (k-1) + k·d + k·d(d+1)/2
//! ```
//!
//! # Failure Modes
//!
//! - **Local optima**: EM converges to local maxima; we restart `n_init` times
//!   from different k-means seedings and keep the best.
//! - **Singular covariance**: Small clusters collapse; `reg_covar` keeps Σₖ
//!   positive definite.
//! - **Non-convergence**: the best-effort parameters are returned and a warning
//!   is logged.

use super::kmeans::Kmeans;
use super::traits::{component_mass, Clustering, MixtureFit, SoftClustering};
use crate::error::{Error, Result};
use crate::linalg::{logsumexp, CholeskyFactor};
use log::warn;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::prelude::*;

const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Gaussian Mixture Model estimator (full covariance).
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    /// Number of components (clusters).
    n_components: usize,
    /// Number of EM restarts; the best lower bound wins.
    n_init: usize,
    /// Maximum EM iterations per restart.
    max_iter: usize,
    /// Convergence tolerance on the mean log-likelihood.
    tol: f64,
    /// Regularization added to each covariance diagonal.
    reg_covar: f64,
    /// Random seed.
    seed: Option<u64>,
}

impl GaussianMixture {
    /// Create a new GMM with the given number of components.
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            n_init: 1,
            max_iter: 100,
            tol: 1e-3,
            reg_covar: 1e-6,
            seed: None,
        }
    }

    /// Set number of restarts.
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set covariance regularization.
    pub fn with_reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fit the mixture to `data` (n × d).
    pub fn fit(&self, data: ArrayView2<'_, f64>) -> Result<FittedGaussianMixture> {
        let n = data.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if self.n_components == 0 || self.n_components > n {
            return Err(Error::InvalidClusterCount {
                requested: self.n_components,
                n_items: n,
            });
        }

        let mut rng: Box<dyn RngCore> = match self.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };

        let mut best: Option<FittedGaussianMixture> = None;
        for _init in 0..self.n_init {
            let labels = Kmeans::new(self.n_components).fit_predict_with_rng(data, &mut rng)?;
            let resp = one_hot(&labels, self.n_components);
            let mut model = FittedGaussianMixture::from_responsibilities(data, &resp, self.reg_covar)?;

            let mut lower_bound = f64::NEG_INFINITY;
            for iter in 1..=self.max_iter {
                let prev = lower_bound;
                let (log_prob_norm, resp) = model.e_step(data)?;
                model = FittedGaussianMixture::from_responsibilities(data, &resp, self.reg_covar)?;
                lower_bound = log_prob_norm;
                model.n_iter = iter;
                if (lower_bound - prev).abs() < self.tol {
                    model.converged = true;
                    break;
                }
            }
            model.lower_bound = lower_bound;

            if !model.converged {
                warn!(
                    "gmm with {} components did not converge after {} iterations",
                    self.n_components, self.max_iter
                );
            }

            if best
                .as_ref()
                .map_or(true, |b| model.lower_bound > b.lower_bound)
            {
                best = Some(model);
            }
        }

        best.ok_or(Error::EmptyInput)
    }
}

impl Default for GaussianMixture {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Clustering for GaussianMixture {
    fn fit_predict(&self, data: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        self.fit(data)?.predict(data)
    }

    fn n_clusters(&self) -> usize {
        self.n_components
    }
}

impl SoftClustering for GaussianMixture {
    fn fit_predict_proba(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.fit(data)?.predict_proba(data)
    }
}

/// Parameters of a fitted [`GaussianMixture`].
#[derive(Debug, Clone)]
pub struct FittedGaussianMixture {
    weights: Array1<f64>,
    means: Array2<f64>,
    covariances: Vec<Array2<f64>>,
    /// Cholesky factors of `covariances`.
    cholesky: Vec<CholeskyFactor>,
    converged: bool,
    n_iter: usize,
    lower_bound: f64,
}

impl FittedGaussianMixture {
    /// M-step: parameters maximizing the expected log-likelihood under `resp`.
    fn from_responsibilities(
        data: ArrayView2<'_, f64>,
        resp: &Array2<f64>,
        reg_covar: f64,
    ) -> Result<Self> {
        let n = data.nrows() as f64;
        let (nk, means, covariances) = estimate_gaussian_parameters(data, resp, reg_covar);
        let cholesky = covariances
            .iter()
            .map(|c| CholeskyFactor::new(c.view()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            weights: nk / n,
            means,
            covariances,
            cholesky,
            converged: false,
            n_iter: 0,
            lower_bound: f64::NEG_INFINITY,
        })
    }

    /// `ln πₖ + ln N(x | μₖ, Σₖ)` for every row and component.
    fn weighted_log_prob(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let d = self.means.ncols();
        if data.ncols() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: data.ncols(),
            });
        }

        let k = self.weights.len();
        let mut out = Array2::zeros((data.nrows(), k));
        for c in 0..k {
            let log_det = self.cholesky[c].log_det();
            let log_w = self.weights[c].ln();
            let mean = self.means.row(c);
            for (i, point) in data.outer_iter().enumerate() {
                let diff = &point - &mean;
                let maha = self.cholesky[c].mahalanobis_sq(diff.view());
                out[[i, c]] = log_w - 0.5 * (d as f64 * LN_2PI + log_det + maha);
            }
        }
        Ok(out)
    }

    /// E-step: mean log-likelihood and normalized responsibilities.
    fn e_step(&self, data: ArrayView2<'_, f64>) -> Result<(f64, Array2<f64>)> {
        let mut log_prob = self.weighted_log_prob(data)?;
        let mut total = 0.0;
        for mut row in log_prob.outer_iter_mut() {
            let norm = logsumexp(&row.to_vec());
            total += norm;
            row.mapv_inplace(|v| (v - norm).exp());
        }
        Ok((total / data.nrows() as f64, log_prob))
    }

    /// Mean per-row log-likelihood of `data` under the model.
    pub fn score(&self, data: ArrayView2<'_, f64>) -> Result<f64> {
        Ok(self.e_step(data)?.0)
    }

    /// Number of free parameters.
    pub fn n_parameters(&self) -> usize {
        let k = self.weights.len();
        let d = self.means.ncols();
        (k - 1) + k * d + k * d * (d + 1) / 2
    }

    /// Bayesian Information Criterion on `data` (lower is better).
    pub fn bic(&self, data: ArrayView2<'_, f64>) -> Result<f64> {
        let n = data.nrows() as f64;
        Ok(-2.0 * self.score(data)? * n + self.n_parameters() as f64 * n.ln())
    }

    /// Whether the best restart converged within its iteration budget.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// EM iterations used by the best restart.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Final mean log-likelihood of the best restart.
    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }
}

impl MixtureFit for FittedGaussianMixture {
    fn weights(&self) -> ArrayView1<'_, f64> {
        self.weights.view()
    }

    fn means(&self) -> ArrayView2<'_, f64> {
        self.means.view()
    }

    fn covariances(&self) -> &[Array2<f64>] {
        &self.covariances
    }

    fn predict_proba(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        Ok(self.e_step(data)?.1)
    }
}

/// One-hot responsibilities from hard labels.
pub(crate) fn one_hot(labels: &[usize], k: usize) -> Array2<f64> {
    let mut resp = Array2::zeros((labels.len(), k));
    for (i, &label) in labels.iter().enumerate() {
        resp[[i, label]] = 1.0;
    }
    resp
}

/// Sufficient statistics `(Nₖ, x̄ₖ, Sₖ)` of the data under `resp`.
///
/// `Sₖ` is the responsibility-weighted covariance around `x̄ₖ` plus `reg_covar·I`.
pub(crate) fn estimate_gaussian_parameters(
    data: ArrayView2<'_, f64>,
    resp: &Array2<f64>,
    reg_covar: f64,
) -> (Array1<f64>, Array2<f64>, Vec<Array2<f64>>) {
    let d = data.ncols();
    let k = resp.ncols();
    let nk = component_mass(resp);
    let means = resp.t().dot(&data) / &nk.view().insert_axis(ndarray::Axis(1));

    let covariances = (0..k)
        .map(|c| {
            let mut cov = Array2::<f64>::zeros((d, d));
            for (i, point) in data.outer_iter().enumerate() {
                let r = resp[[i, c]];
                if r == 0.0 {
                    continue;
                }
                for a in 0..d {
                    let da = point[a] - means[[c, a]];
                    for b in 0..d {
                        cov[[a, b]] += r * da * (point[b] - means[[c, b]]);
                    }
                }
            }
            cov /= nk[c];
            for a in 0..d {
                cov[[a, a]] += reg_covar;
            }
            cov
        })
        .collect();

    (nk, means, covariances)
}
