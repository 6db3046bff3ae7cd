//! Sampled tree summaries and the per-tree data the clustering engine derives from them.
//!
//! - [`TreeSummary`]: one sampled tree (populations, parent → children structure,
//!   and the structural indices once annotated).
//! - [`IndexCalculator`] / [`annotate`]: attach linearity, branching and
//!   clustering indices to every summary.
//! - [`ClusteringFeatures`]: the aligned per-tree vectors fed to clustering, and
//!   the linear / branching split.

mod features;
mod indices;
mod summary;

pub use features::{ClusteringFeatures, FeatureSubset};
pub use indices::{annotate, IndexCalculator, PrecomputedIndices};
pub use summary::{Population, TreeId, TreeSummaries, TreeSummary};
