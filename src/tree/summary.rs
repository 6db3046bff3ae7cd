//! Tree summary records as produced by the upstream sampler.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a sampled tree.
pub type TreeId = usize;

/// All sampled trees, keyed by identifier (iteration order is ascending id).
pub type TreeSummaries = BTreeMap<TreeId, TreeSummary>;

/// One subclonal population of a tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Population {
    /// Cellular prevalence per sample.
    #[serde(default)]
    pub cellular_prevalence: Vec<f64>,
    /// Simple somatic mutations assigned to the population.
    #[serde(default)]
    pub num_ssms: usize,
    /// Copy-number variations assigned to the population.
    #[serde(default)]
    pub num_cnvs: usize,
}

/// Summary of one sampled tree.
///
/// `populations` and `structure` come from the sampler; the three indices are
/// filled in by [`annotate`](crate::tree::annotate).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeSummary {
    /// Population id → description.
    pub populations: BTreeMap<usize, Population>,
    /// Parent population id → child population ids.
    #[serde(default)]
    pub structure: BTreeMap<usize, Vec<usize>>,
    /// Linearity index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linearity_index: Option<f64>,
    /// Branching index (exactly zero for a chain).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branching_index: Option<f64>,
    /// Clustering index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clustering_index: Option<f64>,
}

impl TreeSummary {
    /// Number of populations (nodes) in the tree.
    pub fn node_count(&self) -> usize {
        self.populations.len()
    }

    /// Annotated `(linearity, branching, clustering)` indices of tree `tree`.
    pub fn indices(&self, tree: TreeId) -> Result<(f64, f64, f64)> {
        let get = |value: Option<f64>, index: &'static str| {
            value.ok_or(Error::MissingIndex { tree, index })
        };
        Ok((
            get(self.linearity_index, "linearity_index")?,
            get(self.branching_index, "branching_index")?,
            get(self.clustering_index, "clustering_index")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_sampler_json() {
        let json = r#"{
            "populations": {
                "0": {"cellular_prevalence": [1.0], "num_ssms": 0, "num_cnvs": 0},
                "1": {"cellular_prevalence": [0.8], "num_ssms": 12, "num_cnvs": 1},
                "2": {"cellular_prevalence": [0.3], "num_ssms": 4, "num_cnvs": 0}
            },
            "structure": {"0": [1], "1": [2]}
        }"#;
        let summary: TreeSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.node_count(), 3);
        assert_eq!(summary.structure[&1], vec![2]);
        assert_eq!(summary.populations[&1].num_ssms, 12);
        assert_eq!(summary.linearity_index, None);
    }

    #[test]
    fn missing_index_is_reported() {
        let summary = TreeSummary {
            linearity_index: Some(1.0),
            branching_index: Some(0.0),
            ..Default::default()
        };
        assert_eq!(
            summary.indices(7),
            Err(Error::MissingIndex {
                tree: 7,
                index: "clustering_index"
            })
        );
    }

    #[test]
    fn indices_skipped_when_absent() {
        let json = serde_json::to_value(TreeSummary::default()).unwrap();
        assert!(json.get("branching_index").is_none());
        assert!(json.get("populations").is_some());
    }
}
