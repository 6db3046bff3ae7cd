//! Cluster records returned by [`TreeClusterer::find_clusters`](super::TreeClusterer::find_clusters).

use crate::ellipse::Ellipse;
use crate::tree::TreeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cluster key → cluster. Branching clusters are keyed by number, linear ones
/// by `linear_<node count>`.
pub type ClusterMap = BTreeMap<String, Cluster>;

/// One group of structurally similar trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Whether the cluster holds linear (chain) trees.
    pub is_linear: bool,
    /// Mixing weight; `None` for linear clusters.
    pub weight: Option<f64>,
    /// Hard-assigned member trees, in input order.
    pub members: Vec<TreeId>,
    /// Membership probability of every tree in the clustered subset, in subset
    /// order (a 0/1 indicator for linear clusters).
    pub responsibilities: Vec<f64>,
    /// Cluster center in feature space.
    pub mean: [f64; 2],
    /// Component covariance; `None` for linear clusters.
    pub covariance: Option<[[f64; 2]; 2]>,
    /// Plotting ellipse.
    pub ellipse: Ellipse,
    /// Most central member.
    pub representative_tree: TreeId,
}

/// Key of a linear cluster.
pub(crate) fn linear_key(node_count: usize) -> String {
    format!("linear_{node_count}")
}
