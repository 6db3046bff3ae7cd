//! Linear trees, grouped by exact node count.
//!
//! Chains all have a zero branching ratio, so in feature space they collapse
//! onto the x-axis and a mixture fit is meaningless. Each distinct node count
//! becomes its own cluster instead.

use super::output::{linear_key, Cluster, ClusterMap};
use crate::density::representative_index;
use crate::ellipse::Ellipse;
use crate::error::Result;
use crate::tree::FeatureSubset;
use log::info;
use std::collections::BTreeSet;

/// Cluster the linear subset by node count.
///
/// `minor_axis` is the shared ellipse minor axis (the trees have no vertical
/// spread to derive it from). Returns an empty map for an empty subset.
pub fn linear_clusters(linear: &FeatureSubset, minor_axis: f64) -> Result<ClusterMap> {
    let mut out = ClusterMap::new();
    if linear.is_empty() {
        return Ok(out);
    }

    let node_counts: BTreeSet<usize> = linear.node_counts.iter().copied().collect();
    for &nodes in &node_counts {
        let positions: Vec<usize> = (0..linear.len())
            .filter(|&i| linear.node_counts[i] == nodes)
            .collect();

        let members: Vec<_> = positions.iter().map(|&i| linear.tree_ids[i]).collect();
        let xs: Vec<f64> = positions.iter().map(|&i| linear.points[i][0]).collect();
        let ys: Vec<f64> = positions.iter().map(|&i| linear.points[i][1]).collect();

        let representative = representative_index(&xs, &ys)?;
        let responsibilities = linear
            .node_counts
            .iter()
            .map(|&n| if n == nodes { 1.0 } else { 0.0 })
            .collect();
        let mean_x = xs.iter().sum::<f64>() / xs.len() as f64;

        out.insert(
            linear_key(nodes),
            Cluster {
                is_linear: true,
                weight: None,
                representative_tree: members[representative],
                members,
                responsibilities,
                mean: [mean_x, 0.0],
                covariance: None,
                ellipse: Ellipse::from_linear(&xs, minor_axis),
            },
        );
    }

    info!(
        "grouped {} linear trees into {} clusters",
        linear.len(),
        out.len()
    );
    Ok(out)
}
