//! Structural index annotation.
//!
//! The formulas behind the linearity, branching and clustering indices belong
//! to a separate topology library; this crate only needs a calculator that can
//! be built from one summary and asked for the three values.

use super::summary::{TreeId, TreeSummaries, TreeSummary};
use crate::error::{Error, Result};
use log::debug;

/// Computes the three structural indices of a single tree.
pub trait IndexCalculator: Sized {
    /// Build a calculator for one tree.
    fn from_summary(summary: &TreeSummary) -> Result<Self>;

    /// Linearity index.
    fn linearity_index(&self) -> Result<f64>;

    /// Branching index; exactly zero for a chain.
    fn branching_index(&self) -> Result<f64>;

    /// Clustering index.
    fn clustering_index(&self) -> Result<f64>;
}

/// Calculator that reuses indices already present on the summary.
///
/// For summaries that were annotated upstream.
#[derive(Debug, Clone, Copy)]
pub struct PrecomputedIndices {
    linearity: f64,
    branching: f64,
    clustering: f64,
}

impl IndexCalculator for PrecomputedIndices {
    fn from_summary(summary: &TreeSummary) -> Result<Self> {
        let missing = |index: &'static str| Error::IndexCalculation {
            tree: usize::MAX,
            message: format!("summary carries no {index}"),
        };
        Ok(Self {
            linearity: summary
                .linearity_index
                .ok_or_else(|| missing("linearity_index"))?,
            branching: summary
                .branching_index
                .ok_or_else(|| missing("branching_index"))?,
            clustering: summary
                .clustering_index
                .ok_or_else(|| missing("clustering_index"))?,
        })
    }

    fn linearity_index(&self) -> Result<f64> {
        Ok(self.linearity)
    }

    fn branching_index(&self) -> Result<f64> {
        Ok(self.branching)
    }

    fn clustering_index(&self) -> Result<f64> {
        Ok(self.clustering)
    }
}

/// Compute and attach the structural indices of every tree, in place.
///
/// The first calculator failure aborts the whole pass; its error is tagged
/// with the offending tree id.
pub fn annotate<C: IndexCalculator>(summaries: &mut TreeSummaries) -> Result<()> {
    for (&tree, summary) in summaries.iter_mut() {
        let tag = |e: Error| tag_tree(e, tree);
        let calculator = C::from_summary(summary).map_err(tag)?;
        summary.linearity_index = Some(calculator.linearity_index().map_err(tag)?);
        summary.branching_index = Some(calculator.branching_index().map_err(tag)?);
        summary.clustering_index = Some(calculator.clustering_index().map_err(tag)?);
    }
    debug!("annotated structural indices for {} trees", summaries.len());
    Ok(())
}

fn tag_tree(e: Error, tree: TreeId) -> Error {
    match e {
        Error::IndexCalculation { message, .. } => Error::IndexCalculation { tree, message },
        other => Error::IndexCalculation {
            tree,
            message: other.to_string(),
        },
    }
}
