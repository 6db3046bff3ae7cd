//! Clustering of sampled trees by structural similarity.
//!
//! [`TreeClusterer::find_clusters`] runs the whole pass:
//!
//! 1. annotate every summary with its structural indices,
//! 2. extract `[clustering_index, branching ratio]` features,
//! 3. split chains (branching index exactly zero) from branching trees,
//! 4. cluster branching trees with a Gaussian mixture and chains by node count,
//! 5. merge both into one [`ClusterMap`].
//!
//! ## Mixture mode
//!
//! Without prior options the branching trees go through a finite mixture
//! whose component count is picked by a BIC sweep over `1..=K`. With
//! [`VbgmmOptions`] a variational Bayesian mixture is fitted instead at the
//! `max_components` bound, and the prior prunes unused components.
//!
//! ```rust,no_run
//! use treeclust::{PrecomputedIndices, TreeClusterer, TreeSummaries};
//!
//! let mut summaries = TreeSummaries::new();
//! // ... filled by a loader ...
//! let clusters = TreeClusterer::new()
//!     .with_seed(42)
//!     .find_clusters::<PrecomputedIndices>(&mut summaries, None)
//!     .unwrap();
//! for (key, cluster) in &clusters {
//!     println!("{key}: {} trees", cluster.members.len());
//! }
//! ```

mod linear;
mod mixture;
mod output;

pub use linear::linear_clusters;
pub use output::{Cluster, ClusterMap};

use crate::cluster::VbgmmOptions;
use crate::error::Result;
use crate::tree::{annotate, ClusteringFeatures, IndexCalculator, TreeSummaries};
use log::info;

/// Tree clustering engine configuration.
#[derive(Debug, Clone)]
pub struct TreeClusterer {
    /// Upper bound on mixture components (BIC sweep limit and variational bound).
    max_components: usize,
    /// Restarts per finite-mixture fit.
    n_init: usize,
    /// EM iteration budget per finite-mixture fit.
    max_iter: usize,
    /// Convergence threshold for both mixture kinds.
    tol: f64,
    /// Added to every covariance diagonal.
    reg_covar: f64,
    /// A candidate's BIC must be below this to be selected.
    bic_sentinel: f64,
    /// Relative-improvement threshold that stops the BIC sweep early.
    bic_early_stop: Option<f64>,
    /// Restarts for the variational mixture.
    vb_n_init: usize,
    /// Iteration budget for the variational mixture.
    vb_max_iter: usize,
    /// Random seed for reproducibility.
    seed: Option<u64>,
}

impl Default for TreeClusterer {
    fn default() -> Self {
        Self {
            max_components: 50,
            n_init: 2,
            max_iter: 100,
            tol: 1e-3,
            reg_covar: 1e-6,
            bic_sentinel: 0.0,
            bic_early_stop: None,
            vb_n_init: 3,
            vb_max_iter: 500,
            seed: None,
        }
    }
}

impl TreeClusterer {
    /// Create a clusterer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the component upper bound.
    pub fn with_max_components(mut self, max_components: usize) -> Self {
        self.max_components = max_components;
        self
    }

    /// Set restarts per finite-mixture fit.
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Set the finite-mixture iteration budget.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence threshold.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set covariance regularization.
    pub fn with_reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }

    /// Set the BIC value a candidate must beat to be selected.
    ///
    /// The default of 0 only accepts negative BIC. Use `f64::INFINITY` for a
    /// plain minimum search.
    pub fn with_bic_sentinel(mut self, sentinel: f64) -> Self {
        self.bic_sentinel = sentinel;
        self
    }

    /// Stop the BIC sweep at the first candidate whose relative improvement
    /// over the previous one falls below `delta`.
    pub fn with_bic_early_stop(mut self, delta: f64) -> Self {
        self.bic_early_stop = Some(delta);
        self
    }

    /// Set restarts for the variational mixture.
    pub fn with_vb_n_init(mut self, n_init: usize) -> Self {
        self.vb_n_init = n_init;
        self
    }

    /// Set the variational iteration budget.
    pub fn with_vb_max_iter(mut self, max_iter: usize) -> Self {
        self.vb_max_iter = max_iter;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Annotate, split and cluster every tree in `summaries`.
    ///
    /// Summaries gain their three structural indices in place. Passing
    /// `prior` switches branching trees to the variational mixture.
    ///
    /// Any failure aborts the whole pass; no partial map is returned.
    pub fn find_clusters<C: IndexCalculator>(
        &self,
        summaries: &mut TreeSummaries,
        prior: Option<&VbgmmOptions>,
    ) -> Result<ClusterMap> {
        annotate::<C>(summaries)?;
        let features = ClusteringFeatures::extract(summaries)?;
        let (branching, linear) = features.split();
        info!(
            "{} trees: {} branching, {} linear",
            features.len(),
            branching.len(),
            linear.len()
        );

        let mut clusters = match prior {
            Some(options) => self.run_vbgmm(&branching, options)?,
            None => self.run_gmm(&branching)?,
        };
        clusters.extend(linear_clusters(&linear, features.linear_minor_axis())?);
        Ok(clusters)
    }
}
