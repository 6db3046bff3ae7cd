//! # treeclust
//!
//! Clustering of sampled phylogenetic trees by shape.
//!
//! An upstream sampler produces many candidate trees for the same mutation
//! data. This crate groups them into structurally similar clusters and
//! describes each cluster by a weight, its members, per-tree responsibilities,
//! a representative tree and a 2-D ellipse for plotting.
//!
//! Each tree is reduced to two numbers, its clustering index and its branching
//! ratio `branching / (branching + linearity)`. Chains (branching index exactly
//! zero) are grouped by node count; everything else goes through a Gaussian
//! mixture whose size is picked by BIC, or a variational Bayesian mixture when
//! prior options are supplied.
//!
//! Entry point: [`TreeClusterer::find_clusters`].

pub mod cluster;
pub mod clusterer;
pub mod density;
pub mod ellipse;
/// Error types used across `treeclust`.
pub mod error;
pub(crate) mod linalg;
pub mod tree;

#[cfg(test)]
mod clusterer_tests;

pub use cluster::{
    BayesianGaussianMixture, Clustering, GaussianMixture, Kmeans, MixtureFit, SoftClustering,
    VbgmmOptions, WeightConcentrationPriorType,
};
pub use clusterer::{Cluster, ClusterMap, TreeClusterer};
pub use density::{representative_index, GaussianKde};
pub use ellipse::Ellipse;
pub use error::{Error, Result};
pub use tree::{
    annotate, IndexCalculator, Population, PrecomputedIndices, TreeId, TreeSummaries,
    TreeSummary,
};
