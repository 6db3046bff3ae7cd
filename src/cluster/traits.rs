//! Clustering traits.

use crate::error::Result;
use crate::linalg::argmax;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Trait for clustering algorithms.
pub trait Clustering {
    /// Fit the model to data (n × d) and return cluster assignments.
    ///
    /// Returns a vector of cluster labels, one per input row.
    fn fit_predict(&self, data: ArrayView2<'_, f64>) -> Result<Vec<usize>>;

    /// Get the number of clusters.
    fn n_clusters(&self) -> usize;
}

/// Trait for soft clustering algorithms that return probabilities.
pub trait SoftClustering: Clustering {
    /// Fit and return soft cluster assignments (probabilities).
    ///
    /// Returns an n × k matrix where entry \[i, k\] is the probability that
    /// row i belongs to component k.
    fn fit_predict_proba(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>>;
}

/// A fitted mixture model: per-component parameters plus posterior responsibilities.
pub trait MixtureFit {
    /// Mixing weights, one per component.
    fn weights(&self) -> ArrayView1<'_, f64>;

    /// Component means (k × d).
    fn means(&self) -> ArrayView2<'_, f64>;

    /// Component covariance matrices (each d × d).
    fn covariances(&self) -> &[Array2<f64>];

    /// Posterior component probabilities for each row of `data` (n × k).
    fn predict_proba(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>>;

    /// Hard assignment: argmax responsibility, first maximum on ties.
    fn predict(&self, data: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        let resp = self.predict_proba(data)?;
        Ok(hard_labels(&resp))
    }

    /// Number of components.
    fn n_components(&self) -> usize {
        self.weights().len()
    }

    /// Number of distinct components that own at least one row under hard assignment.
    fn occupied_components(&self, data: ArrayView2<'_, f64>) -> Result<usize> {
        let labels = self.predict(data)?;
        let mut seen = vec![false; self.n_components()];
        for label in labels {
            seen[label] = true;
        }
        Ok(seen.into_iter().filter(|&s| s).count())
    }
}

/// Row-wise argmax of a responsibility matrix.
pub(crate) fn hard_labels(resp: &Array2<f64>) -> Vec<usize> {
    resp.outer_iter()
        .map(|row| argmax(&row.to_vec()))
        .collect()
}

/// Component sizes `Σᵢ resp[i, k]` with the small floor that keeps later divisions finite.
pub(crate) fn component_mass(resp: &Array2<f64>) -> Array1<f64> {
    resp.sum_axis(ndarray::Axis(0)) + 10.0 * f64::EPSILON
}
