//! Clustering algorithms over dense `f64` feature matrices.
//!
//! ## Hard vs Soft Clustering
//!
//! **Hard clustering** assigns each row to exactly one cluster. **Soft
//! clustering** gives each row a probability distribution over clusters; the
//! hard label is its argmax.
//!
//! Tree clustering reports both: `members` come from the hard labels and
//! `responsibilities` from the soft ones.
//!
//! ## Algorithms
//!
//! ### Gaussian Mixture Model
//!
//! Models data as a mixture of k Gaussian distributions:
//!
//! ```text
//! P(x) = Σ π_k × N(x | μ_k, Σ_k)
//! ```
//!
//! Fitted by EM from a k-means start, keeping the best of several restarts.
//! [`FittedGaussianMixture::bic`] scores a fit for model selection:
//!
//! ```text
//! BIC = -2 · log L + p · ln n,   p = (k-1) + k·d + k·d(d+1)/2
//! ```
//!
//! ### Variational Bayesian Gaussian Mixture
//!
//! Same generative model with priors on every parameter. Coordinate ascent on
//! the evidence lower bound drives the weights of unneeded components toward
//! zero, so `k` acts as an upper bound rather than a fixed count. The weight
//! prior is either a finite Dirichlet or a truncated Dirichlet process
//! (stick-breaking).
//!
//! ### K-means
//!
//! k-means++ seeding followed by Lloyd iterations. Used here to initialise
//! both mixture kinds.
//!
//! ## Usage
//!
//! ```rust
//! use ndarray::array;
//! use treeclust::cluster::{Clustering, GaussianMixture, Kmeans, SoftClustering};
//!
//! let data = array![[0.0, 0.0], [0.1, 0.1], [10.0, 10.0], [10.1, 10.1]];
//!
//! let labels = Kmeans::new(2).with_seed(0).fit_predict(data.view()).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//!
//! let probs = GaussianMixture::new(2)
//!     .with_seed(0)
//!     .fit_predict_proba(data.view())
//!     .unwrap();
//! assert_eq!(probs.dim(), (4, 2));
//! ```

mod bayesian;
mod gmm;
mod kmeans;
mod traits;

pub use bayesian::{
    BayesianGaussianMixture, CovariancePrior, FittedBayesianMixture, VbgmmOptions,
    WeightConcentrationPriorType,
};
pub use gmm::{FittedGaussianMixture, GaussianMixture};
pub use kmeans::Kmeans;
pub use traits::{Clustering, MixtureFit, SoftClustering};

pub(crate) use traits::hard_labels;
