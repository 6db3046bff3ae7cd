//! Per-tree clustering features and the linear / branching split.

use super::summary::{TreeId, TreeSummaries};
use crate::error::{Error, Result};
use ndarray::Array2;

/// Minor-axis scale for linear ellipses, as a fraction of the largest branching ratio.
const LINEAR_MINOR_AXIS_RATIO: f64 = 0.1;
/// Minor-axis scale used when every branching ratio is zero.
const LINEAR_MINOR_AXIS_FLOOR: f64 = 0.01;

/// Aligned per-tree vectors, in summary iteration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusteringFeatures {
    /// `branching_index == 0`, compared exactly.
    pub is_linear: Vec<bool>,
    /// `[clustering_index, branching / (branching + linearity)]`.
    pub points: Vec<[f64; 2]>,
    /// Tree identifiers.
    pub tree_ids: Vec<TreeId>,
    /// Population counts.
    pub node_counts: Vec<usize>,
}

/// One side of the linear / branching split, order preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSubset {
    /// Feature points.
    pub points: Vec<[f64; 2]>,
    /// Tree identifiers aligned with `points`.
    pub tree_ids: Vec<TreeId>,
    /// Population counts aligned with `points`.
    pub node_counts: Vec<usize>,
}

impl FeatureSubset {
    /// Number of trees in the subset.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the subset holds no trees.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points as an n × 2 matrix.
    pub fn matrix(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.points.len(), 2), |(i, j)| self.points[i][j])
    }

    fn push(&mut self, point: [f64; 2], tree: TreeId, nodes: usize) {
        self.points.push(point);
        self.tree_ids.push(tree);
        self.node_counts.push(nodes);
    }
}

impl ClusteringFeatures {
    /// Extract features from annotated summaries.
    ///
    /// Fails with [`Error::MissingIndex`] for unannotated trees and
    /// [`Error::DegenerateIndices`] when a tree's branching ratio is undefined.
    pub fn extract(summaries: &TreeSummaries) -> Result<Self> {
        let mut out = Self::default();
        for (&tree, summary) in summaries {
            let (linearity, branching, clustering) = summary.indices(tree)?;
            let denom = branching + linearity;
            if denom == 0.0 {
                return Err(Error::DegenerateIndices { tree });
            }
            out.is_linear.push(branching == 0.0);
            out.points.push([clustering, branching / denom]);
            out.tree_ids.push(tree);
            out.node_counts.push(summary.node_count());
        }
        Ok(out)
    }

    /// Number of trees.
    pub fn len(&self) -> usize {
        self.tree_ids.len()
    }

    /// Whether there are no trees.
    pub fn is_empty(&self) -> bool {
        self.tree_ids.is_empty()
    }

    /// Split into `(branching, linear)` subsets, keeping relative order.
    pub fn split(&self) -> (FeatureSubset, FeatureSubset) {
        let mut branching = FeatureSubset::default();
        let mut linear = FeatureSubset::default();
        for i in 0..self.len() {
            let side = if self.is_linear[i] {
                &mut linear
            } else {
                &mut branching
            };
            side.push(self.points[i], self.tree_ids[i], self.node_counts[i]);
        }
        (branching, linear)
    }

    /// Minor-axis length for linear-cluster ellipses.
    ///
    /// A tenth of the largest branching ratio over *all* trees, or a small
    /// floor when that is exactly zero.
    pub fn linear_minor_axis(&self) -> f64 {
        let max_ratio = self
            .points
            .iter()
            .map(|p| p[1])
            .fold(0.0, f64::max);
        let scale = LINEAR_MINOR_AXIS_RATIO * max_ratio;
        if scale == 0.0 {
            LINEAR_MINOR_AXIS_FLOOR
        } else {
            scale
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::summary::{Population, TreeSummary};
    use std::collections::BTreeMap;

    fn summary(li: f64, bi: f64, ci: f64, nodes: usize) -> TreeSummary {
        TreeSummary {
            populations: (0..nodes).map(|i| (i, Population::default())).collect(),
            structure: BTreeMap::new(),
            linearity_index: Some(li),
            branching_index: Some(bi),
            clustering_index: Some(ci),
        }
    }

    #[test]
    fn extract_aligns_vectors() {
        let mut summaries = TreeSummaries::new();
        summaries.insert(2, summary(3.0, 1.0, 0.5, 4));
        summaries.insert(0, summary(2.0, 0.0, 0.25, 3));

        let f = ClusteringFeatures::extract(&summaries).unwrap();
        assert_eq!(f.tree_ids, vec![0, 2]);
        assert_eq!(f.is_linear, vec![true, false]);
        assert_eq!(f.points, vec![[0.25, 0.0], [0.5, 0.25]]);
        assert_eq!(f.node_counts, vec![3, 4]);
    }

    #[test]
    fn linearity_uses_exact_zero() {
        let mut summaries = TreeSummaries::new();
        summaries.insert(0, summary(2.0, 1e-300, 0.1, 3));
        let f = ClusteringFeatures::extract(&summaries).unwrap();
        assert_eq!(f.is_linear, vec![false]);
    }

    #[test]
    fn zero_denominator_is_rejected() {
        let mut summaries = TreeSummaries::new();
        summaries.insert(5, summary(0.0, 0.0, 0.1, 1));
        assert_eq!(
            ClusteringFeatures::extract(&summaries),
            Err(Error::DegenerateIndices { tree: 5 })
        );
    }

    #[test]
    fn split_preserves_order() {
        let f = ClusteringFeatures {
            is_linear: vec![false, true, false, true],
            points: vec![[0.1, 0.5], [0.2, 0.0], [0.3, 0.4], [0.4, 0.0]],
            tree_ids: vec![10, 11, 12, 13],
            node_counts: vec![4, 3, 5, 3],
        };
        let (branching, linear) = f.split();
        assert_eq!(branching.tree_ids, vec![10, 12]);
        assert_eq!(linear.tree_ids, vec![11, 13]);
        assert_eq!(linear.node_counts, vec![3, 3]);
        assert_eq!(branching.matrix()[[1, 0]], 0.3);
    }

    #[test]
    fn minor_axis_scale_and_floor() {
        let f = ClusteringFeatures {
            is_linear: vec![false, true],
            points: vec![[0.1, 0.5], [0.2, 0.0]],
            tree_ids: vec![0, 1],
            node_counts: vec![4, 3],
        };
        assert!((f.linear_minor_axis() - 0.05).abs() < 1e-12);

        let all_linear = ClusteringFeatures {
            is_linear: vec![true],
            points: vec![[0.2, 0.0]],
            tree_ids: vec![0],
            node_counts: vec![3],
        };
        assert_eq!(all_linear.linear_minor_axis(), 0.01);
    }
}
