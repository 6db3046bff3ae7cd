//! Variational Bayesian Gaussian mixture.
//!
//! Instead of choosing the number of components up front, the model is given a
//! generous upper bound and a prior on the mixing weights that makes unused
//! components shrink toward zero weight. Two weight priors are supported:
//!
//! - **Dirichlet process** (stick-breaking): `vₖ ~ Beta(1, α)`, `πₖ = vₖ Πⱼ<ₖ (1 - vⱼ)`.
//!   Later components are increasingly starved, so the effective count adapts
//!   to the data.
//! - **Dirichlet distribution**: `π ~ Dir(α, …, α)`. Small α favours few active
//!   components.
//!
//! Means get a Gaussian prior `N(m₀, (β₀Λ)⁻¹)` and precisions a Wishart prior
//! `W(W₀, ν₀)` where `W₀⁻¹` is the covariance prior.
//!
//! Fitting is coordinate ascent on the evidence lower bound (ELBO): the E-step
//! computes responsibilities from expected log weights and expected Gaussian
//! log densities, the M-step updates the conjugate posterior parameters.

use super::gmm::{estimate_gaussian_parameters, one_hot};
use super::kmeans::Kmeans;
use super::traits::{Clustering, MixtureFit, SoftClustering};
use crate::error::{Error, Result};
use crate::linalg::{covariance, logsumexp, CholeskyFactor};
use log::warn;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::function::beta::ln_beta;
use statrs::function::gamma::{digamma, ln_gamma};
use std::f64::consts::LN_2;

const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Family of the prior placed on the mixing weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightConcentrationPriorType {
    /// Stick-breaking (truncated Dirichlet process).
    #[default]
    DirichletProcess,
    /// Symmetric Dirichlet distribution.
    DirichletDistribution,
}

/// Prior on component covariances (`W₀⁻¹`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CovariancePrior {
    /// Isotropic prior `s · I`.
    Scalar(f64),
    /// Full d × d matrix, row-major.
    Matrix(Vec<Vec<f64>>),
}

/// Hyperparameters for the variational mixture.
///
/// Deserializes from the snake_case option names, e.g.
/// `{"weight_concentration_prior": 0.01, "weight_concentration_prior_type": "dirichlet_process", "covariance_prior": 0.02}`.
/// Unset values fall back to data-driven defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VbgmmOptions {
    /// Concentration α of the weight prior (default `1 / n_components`).
    pub weight_concentration_prior: Option<f64>,
    /// Weight prior family.
    pub weight_concentration_prior_type: WeightConcentrationPriorType,
    /// Covariance prior (default: empirical covariance of the data).
    pub covariance_prior: Option<CovariancePrior>,
    /// Precision β₀ of the mean prior (default 1).
    pub mean_precision_prior: Option<f64>,
    /// Wishart degrees of freedom ν₀ (default: data dimension).
    pub degrees_of_freedom_prior: Option<f64>,
}

/// Variational Bayesian Gaussian mixture estimator (full covariance).
#[derive(Debug, Clone)]
pub struct BayesianGaussianMixture {
    n_components: usize,
    options: VbgmmOptions,
    n_init: usize,
    max_iter: usize,
    tol: f64,
    reg_covar: f64,
    seed: Option<u64>,
}

/// Priors resolved against a concrete dataset.
#[derive(Debug, Clone)]
struct Priors {
    kind: WeightConcentrationPriorType,
    weight_concentration: f64,
    mean_precision: f64,
    mean: Array1<f64>,
    degrees_of_freedom: f64,
    covariance: Array2<f64>,
}

impl BayesianGaussianMixture {
    /// Create a variational mixture with an upper bound of `n_components`.
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            options: VbgmmOptions::default(),
            n_init: 1,
            max_iter: 100,
            tol: 1e-3,
            reg_covar: 1e-6,
            seed: None,
        }
    }

    /// Set prior hyperparameters.
    pub fn with_options(mut self, options: VbgmmOptions) -> Self {
        self.options = options;
        self
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

    /// Set convergence tolerance on the lower bound.
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

    fn resolve_priors(&self, data: ArrayView2<'_, f64>) -> Result<Priors> {
        let d = data.ncols();
        let opts = &self.options;

        let weight_concentration = opts
            .weight_concentration_prior
            .unwrap_or(1.0 / self.n_components as f64);
        if !(weight_concentration > 0.0) {
            return Err(Error::InvalidParameter {
                name: "weight_concentration_prior",
                message: "must be > 0",
            });
        }

        let mean_precision = opts.mean_precision_prior.unwrap_or(1.0);
        if !(mean_precision > 0.0) {
            return Err(Error::InvalidParameter {
                name: "mean_precision_prior",
                message: "must be > 0",
            });
        }

        let degrees_of_freedom = opts.degrees_of_freedom_prior.unwrap_or(d as f64);
        if !(degrees_of_freedom > d as f64 - 1.0) {
            return Err(Error::InvalidParameter {
                name: "degrees_of_freedom_prior",
                message: "must be > n_features - 1",
            });
        }

        let covariance = match &opts.covariance_prior {
            Some(CovariancePrior::Scalar(s)) => {
                if !(*s > 0.0) {
                    return Err(Error::InvalidParameter {
                        name: "covariance_prior",
                        message: "must be > 0",
                    });
                }
                Array2::eye(d) * *s
            }
            Some(CovariancePrior::Matrix(rows)) => {
                if rows.len() != d {
                    return Err(Error::DimensionMismatch {
                        expected: d,
                        found: rows.len(),
                    });
                }
                let mut m = Array2::zeros((d, d));
                for (i, row) in rows.iter().enumerate() {
                    if row.len() != d {
                        return Err(Error::DimensionMismatch {
                            expected: d,
                            found: row.len(),
                        });
                    }
                    for (j, v) in row.iter().enumerate() {
                        m[[i, j]] = *v;
                    }
                }
                CholeskyFactor::new(m.view()).map_err(|_| Error::InvalidParameter {
                    name: "covariance_prior",
                    message: "must be positive definite",
                })?;
                m
            }
            None => covariance(data, 1) + Array2::<f64>::eye(d) * self.reg_covar,
        };

        Ok(Priors {
            kind: opts.weight_concentration_prior_type,
            weight_concentration,
            mean_precision,
            mean: data
                .mean_axis(Axis(0))
                .ok_or(Error::EmptyInput)?,
            degrees_of_freedom,
            covariance,
        })
    }

    /// Fit the variational mixture to `data` (n × d).
    pub fn fit(&self, data: ArrayView2<'_, f64>) -> Result<FittedBayesianMixture> {
        let n = data.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if self.n_components == 0 {
            return Err(Error::InvalidParameter {
                name: "n_components",
                message: "must be > 0",
            });
        }

        let priors = self.resolve_priors(data)?;

        let mut rng: Box<dyn RngCore> = match self.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };

        // With fewer rows than components, k-means seeds only n groups; the rest start empty.
        let seeded = self.n_components.min(n);

        let mut best: Option<FittedBayesianMixture> = None;
        for _init in 0..self.n_init {
            let labels = Kmeans::new(seeded).fit_predict_with_rng(data, &mut rng)?;
            let resp = one_hot(&labels, self.n_components);
            let mut model = FittedBayesianMixture::m_step(data, &resp, &priors, self.reg_covar)?;

            let mut lower_bound = f64::NEG_INFINITY;
            for iter in 1..=self.max_iter {
                let prev = lower_bound;
                let (_, log_resp) = model.e_step(data)?;
                let resp = log_resp.mapv(f64::exp);
                model = FittedBayesianMixture::m_step(data, &resp, &priors, self.reg_covar)?;
                lower_bound = model.compute_lower_bound(&log_resp, &priors);
                model.n_iter = iter;
                if (lower_bound - prev).abs() < self.tol {
                    model.converged = true;
                    break;
                }
            }
            model.lower_bound = lower_bound;

            if !model.converged {
                warn!(
                    "variational mixture did not converge after {} iterations",
                    self.max_iter
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

impl Clustering for BayesianGaussianMixture {
    fn fit_predict(&self, data: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        self.fit(data)?.predict(data)
    }

    fn n_clusters(&self) -> usize {
        self.n_components
    }
}

impl SoftClustering for BayesianGaussianMixture {
    fn fit_predict_proba(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.fit(data)?.predict_proba(data)
    }
}

/// Posterior parameters of a fitted [`BayesianGaussianMixture`].
#[derive(Debug, Clone)]
pub struct FittedBayesianMixture {
    kind: WeightConcentrationPriorType,
    /// First Beta parameter (process) or Dirichlet parameter (distribution).
    concentration_a: Array1<f64>,
    /// Second Beta parameter; unused for the Dirichlet distribution.
    concentration_b: Array1<f64>,
    mean_precision: Array1<f64>,
    means: Array2<f64>,
    degrees_of_freedom: Array1<f64>,
    covariances: Vec<Array2<f64>>,
    cholesky: Vec<CholeskyFactor>,
    weights: Array1<f64>,
    converged: bool,
    n_iter: usize,
    lower_bound: f64,
}

impl FittedBayesianMixture {
    fn m_step(
        data: ArrayView2<'_, f64>,
        resp: &Array2<f64>,
        priors: &Priors,
        reg_covar: f64,
    ) -> Result<Self> {
        let d = data.ncols();
        let (nk, xk, sk) = estimate_gaussian_parameters(data, resp, reg_covar);
        let k = nk.len();

        let (concentration_a, concentration_b) = match priors.kind {
            WeightConcentrationPriorType::DirichletProcess => {
                let mut tail = Array1::zeros(k);
                let mut acc = 0.0;
                for c in (0..k).rev() {
                    tail[c] = priors.weight_concentration + acc;
                    acc += nk[c];
                }
                (nk.mapv(|v| 1.0 + v), tail)
            }
            WeightConcentrationPriorType::DirichletDistribution => (
                nk.mapv(|v| priors.weight_concentration + v),
                Array1::zeros(k),
            ),
        };

        let mean_precision = nk.mapv(|v| priors.mean_precision + v);
        let mut means = Array2::zeros((k, d));
        for c in 0..k {
            for j in 0..d {
                means[[c, j]] = (priors.mean_precision * priors.mean[j] + nk[c] * xk[[c, j]])
                    / mean_precision[c];
            }
        }

        let degrees_of_freedom = nk.mapv(|v| priors.degrees_of_freedom + v);
        let mut covariances = Vec::with_capacity(k);
        for c in 0..k {
            let diff = &xk.row(c) - &priors.mean;
            let shrink = nk[c] * priors.mean_precision / mean_precision[c];
            let mut cov = &priors.covariance + &(&sk[c] * nk[c]);
            for a in 0..d {
                for b in 0..d {
                    cov[[a, b]] += shrink * diff[a] * diff[b];
                }
            }
            cov /= degrees_of_freedom[c];
            covariances.push(cov);
        }
        let cholesky = covariances
            .iter()
            .map(|c| CholeskyFactor::new(c.view()))
            .collect::<Result<Vec<_>>>()?;

        let weights = expected_weights(priors.kind, &concentration_a, &concentration_b);

        Ok(Self {
            kind: priors.kind,
            concentration_a,
            concentration_b,
            mean_precision,
            means,
            degrees_of_freedom,
            covariances,
            cholesky,
            weights,
            converged: false,
            n_iter: 0,
            lower_bound: f64::NEG_INFINITY,
        })
    }

    /// `E[ln πₖ]` under the variational weight posterior.
    fn expected_log_weights(&self) -> Array1<f64> {
        match self.kind {
            WeightConcentrationPriorType::DirichletProcess => {
                let k = self.concentration_a.len();
                let mut out = Array1::zeros(k);
                let mut stick = 0.0;
                for c in 0..k {
                    let a = self.concentration_a[c];
                    let b = self.concentration_b[c];
                    let digamma_sum = digamma(a + b);
                    out[c] = digamma(a) - digamma_sum + stick;
                    stick += digamma(b) - digamma_sum;
                }
                out
            }
            WeightConcentrationPriorType::DirichletDistribution => {
                let total = digamma(self.concentration_a.sum());
                self.concentration_a.mapv(|a| digamma(a) - total)
            }
        }
    }

    /// `E[ln N(x | μₖ, Λₖ⁻¹)]` for every row and component.
    fn expected_log_prob(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let d = self.means.ncols();
        if data.ncols() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: data.ncols(),
            });
        }
        let df = d as f64;

        let k = self.means.nrows();
        let mut out = Array2::zeros((data.nrows(), k));
        for c in 0..k {
            let nu = self.degrees_of_freedom[c];
            let log_det_prec_chol = -0.5 * self.cholesky[c].log_det();
            let log_lambda = df * LN_2
                + (0..d)
                    .map(|i| digamma(0.5 * (nu - i as f64)))
                    .sum::<f64>();
            let mean = self.means.row(c);
            for (i, point) in data.outer_iter().enumerate() {
                let diff = &point - &mean;
                let maha = self.cholesky[c].mahalanobis_sq(diff.view());
                let log_gauss =
                    -0.5 * (df * LN_2PI + maha) + log_det_prec_chol - 0.5 * df * nu.ln();
                out[[i, c]] = log_gauss + 0.5 * (log_lambda - df / self.mean_precision[c]);
            }
        }
        Ok(out)
    }

    /// E-step: mean log normalizer and log responsibilities.
    fn e_step(&self, data: ArrayView2<'_, f64>) -> Result<(f64, Array2<f64>)> {
        let mut log_resp = self.expected_log_prob(data)? + &self.expected_log_weights();
        let mut total = 0.0;
        for mut row in log_resp.outer_iter_mut() {
            let norm = logsumexp(&row.to_vec());
            total += norm;
            row.mapv_inplace(|v| v - norm);
        }
        Ok((total / data.nrows() as f64, log_resp))
    }

    fn compute_lower_bound(&self, log_resp: &Array2<f64>, priors: &Priors) -> f64 {
        let d = self.means.ncols();
        let df = d as f64;

        let log_wishart: f64 = (0..self.degrees_of_freedom.len())
            .map(|c| {
                let nu = self.degrees_of_freedom[c];
                let log_det_prec_chol =
                    -0.5 * self.cholesky[c].log_det() - 0.5 * df * nu.ln();
                let gammas: f64 = (0..d).map(|i| ln_gamma(0.5 * (nu - i as f64))).sum();
                -(nu * log_det_prec_chol + nu * df * 0.5 * LN_2 + gammas)
            })
            .sum();

        let log_norm_weight = match priors.kind {
            WeightConcentrationPriorType::DirichletProcess => -self
                .concentration_a
                .iter()
                .zip(self.concentration_b.iter())
                .map(|(&a, &b)| ln_beta(a, b))
                .sum::<f64>(),
            WeightConcentrationPriorType::DirichletDistribution => {
                ln_gamma(self.concentration_a.sum())
                    - self.concentration_a.iter().map(|&a| ln_gamma(a)).sum::<f64>()
            }
        };

        let entropy: f64 = log_resp
            .iter()
            .filter(|v| v.is_finite())
            .map(|&v| v.exp() * v)
            .sum();

        -entropy
            - log_wishart
            - log_norm_weight
            - 0.5 * df * self.mean_precision.iter().map(|v| v.ln()).sum::<f64>()
    }

    /// Whether the best restart converged within its iteration budget.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Iterations used by the best restart.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Final evidence lower bound of the best restart.
    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    /// Posterior Wishart degrees of freedom per component.
    pub fn degrees_of_freedom(&self) -> ArrayView1<'_, f64> {
        self.degrees_of_freedom.view()
    }
}

impl MixtureFit for FittedBayesianMixture {
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
        Ok(self.e_step(data)?.1.mapv(f64::exp))
    }
}

/// Posterior mean mixing weights.
fn expected_weights(
    kind: WeightConcentrationPriorType,
    a: &Array1<f64>,
    b: &Array1<f64>,
) -> Array1<f64> {
    let mut weights = match kind {
        WeightConcentrationPriorType::DirichletProcess => {
            let mut remaining = 1.0;
            let mut w = Array1::zeros(a.len());
            for c in 0..a.len() {
                let sum = a[c] + b[c];
                w[c] = a[c] / sum * remaining;
                remaining *= b[c] / sum;
            }
            w
        }
        WeightConcentrationPriorType::DirichletDistribution => a.clone(),
    };
    let total = weights.sum();
    weights /= total;
    weights
}
