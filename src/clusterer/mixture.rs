//! Mixture-model clustering of branching trees.

use super::output::{Cluster, ClusterMap};
use super::TreeClusterer;
use crate::cluster::{
    hard_labels, BayesianGaussianMixture, FittedGaussianMixture, GaussianMixture, MixtureFit,
    VbgmmOptions,
};
use crate::density::representative_index;
use crate::ellipse::Ellipse;
use crate::error::{Error, Result};
use crate::tree::FeatureSubset;
use log::{debug, info};
use ndarray::ArrayView2;

/// Initial BIC of the early-stopping ratio test.
const EARLY_STOP_PREV_BIC: f64 = 10_000.0;

/// How emitted mixture components are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComponentKeys {
    /// "1", "2", … in component order, counting only emitted components.
    Dense,
    /// The raw component index.
    ComponentIndex,
}

impl TreeClusterer {
    fn gaussian_mixture(&self, n_components: usize) -> GaussianMixture {
        let gmm = GaussianMixture::new(n_components)
            .with_n_init(self.n_init)
            .with_max_iter(self.max_iter)
            .with_tol(self.tol)
            .with_reg_covar(self.reg_covar);
        match self.seed {
            Some(seed) => gmm.with_seed(seed),
            None => gmm,
        }
    }

    /// Number of sweep candidates for `data` (n × d).
    ///
    /// Half the scalar element count minus one, capped by `max_components`
    /// and by the number of rows.
    pub(crate) fn bic_sweep_len(&self, data: ArrayView2<'_, f64>) -> usize {
        let half_size = data.len() / 2;
        half_size
            .saturating_sub(1)
            .min(self.max_components)
            .min(data.nrows())
    }

    /// Component count with the lowest BIC below the sentinel (1 if none beats it).
    pub fn components_min_bic(&self, data: ArrayView2<'_, f64>) -> Result<usize> {
        let mut min_bic = self.bic_sentinel;
        let mut prev_bic = EARLY_STOP_PREV_BIC;
        let mut best = 1;

        for k in 1..=self.bic_sweep_len(data) {
            let bic = self.gaussian_mixture(k).fit(data)?.bic(data)?;
            debug!("bic({k}) = {bic:.4}");

            if let Some(delta) = self.bic_early_stop {
                if prev_bic / bic - 1.0 > -delta {
                    debug!("bic sweep stopped early at {k} components");
                    return Ok(k);
                }
            }
            if bic < min_bic {
                best = k;
                min_bic = bic;
            }
            prev_bic = bic;
        }

        Ok(best)
    }

    /// Fit the BIC-selected count, shrinking it until every component owns a tree.
    fn fit_occupied_gmm(&self, data: ArrayView2<'_, f64>) -> Result<FittedGaussianMixture> {
        let mut n_components = self.components_min_bic(data)?;
        info!("bic selected {n_components} components");

        loop {
            let fit = self.gaussian_mixture(n_components).fit(data)?;
            let occupied = fit.occupied_components(data)?;
            if occupied == n_components {
                return Ok(fit);
            }
            debug!("{occupied} of {n_components} components own trees, refitting with fewer");
            if n_components == 1 {
                // A single component always owns every row.
                return Err(Error::Other("single-component fit has no members".into()));
            }
            n_components -= 1;
        }
    }

    /// Finite mixture with BIC-selected component count.
    ///
    /// Keys are dense, starting at "1". Returns an empty map for no trees.
    pub fn run_gmm(&self, branching: &FeatureSubset) -> Result<ClusterMap> {
        if branching.is_empty() {
            return Ok(ClusterMap::new());
        }
        let data = branching.matrix();
        let fit = self.fit_occupied_gmm(data.view())?;
        mixture_clusters(&fit, branching, ComponentKeys::Dense)
    }

    /// Variational Bayesian mixture with `max_components` as the upper bound.
    ///
    /// Keys are the raw component indices of the fit; components that own no
    /// tree are left out. Returns an empty map for no trees.
    pub fn run_vbgmm(&self, branching: &FeatureSubset, options: &VbgmmOptions) -> Result<ClusterMap> {
        if branching.is_empty() {
            return Ok(ClusterMap::new());
        }
        let data = branching.matrix();
        let mut vb = BayesianGaussianMixture::new(self.max_components)
            .with_options(options.clone())
            .with_n_init(self.vb_n_init)
            .with_max_iter(self.vb_max_iter)
            .with_tol(self.tol)
            .with_reg_covar(self.reg_covar);
        if let Some(seed) = self.seed {
            vb = vb.with_seed(seed);
        }
        let fit = vb.fit(data.view())?;
        mixture_clusters(&fit, branching, ComponentKeys::ComponentIndex)
    }
}

/// Build one [`Cluster`] per occupied component of a fitted mixture.
fn mixture_clusters(
    fit: &impl MixtureFit,
    branching: &FeatureSubset,
    keys: ComponentKeys,
) -> Result<ClusterMap> {
    let data = branching.matrix();
    let resp = fit.predict_proba(data.view())?;
    let labels = hard_labels(&resp);

    let mut out = ClusterMap::new();
    let mut dense_key = 1;
    for c in 0..fit.n_components() {
        let positions: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == c).collect();
        if positions.is_empty() {
            continue;
        }

        let members: Vec<_> = positions.iter().map(|&i| branching.tree_ids[i]).collect();
        let xs: Vec<f64> = positions.iter().map(|&i| branching.points[i][0]).collect();
        let ys: Vec<f64> = positions.iter().map(|&i| branching.points[i][1]).collect();
        let representative = representative_index(&xs, &ys)?;

        let mean = [fit.means()[[c, 0]], fit.means()[[c, 1]]];
        let cov = &fit.covariances()[c];
        let covariance = [[cov[[0, 0]], cov[[0, 1]]], [cov[[1, 0]], cov[[1, 1]]]];

        let key = match keys {
            ComponentKeys::Dense => {
                let key = dense_key.to_string();
                dense_key += 1;
                key
            }
            ComponentKeys::ComponentIndex => c.to_string(),
        };

        out.insert(
            key,
            Cluster {
                is_linear: false,
                weight: Some(fit.weights()[c]),
                representative_tree: members[representative],
                members,
                responsibilities: resp.column(c).to_vec(),
                mean,
                covariance: Some(covariance),
                ellipse: Ellipse::from_gaussian(mean, covariance),
            },
        );
    }

    info!(
        "clustered {} branching trees into {} clusters",
        branching.len(),
        out.len()
    );
    Ok(out)
}
