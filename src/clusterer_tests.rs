#[cfg(test)]
mod tests {
    use crate::cluster::{VbgmmOptions, WeightConcentrationPriorType};
    use crate::tree::{Population, PrecomputedIndices, TreeSummaries, TreeSummary};
    use crate::{ClusterMap, Result, TreeClusterer};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    /// Summary whose indices give the feature point `[x, y]` (`y` = branching ratio).
    fn branching_tree(x: f64, y: f64, nodes: usize) -> TreeSummary {
        TreeSummary {
            populations: (0..nodes).map(|p| (p, Population::default())).collect(),
            structure: BTreeMap::new(),
            linearity_index: Some(1.0 - y),
            branching_index: Some(y),
            clustering_index: Some(x),
        }
    }

    fn linear_tree(x: f64, nodes: usize) -> TreeSummary {
        TreeSummary {
            populations: (0..nodes).map(|p| (p, Population::default())).collect(),
            structure: (0..nodes.saturating_sub(1)).map(|p| (p, vec![p + 1])).collect(),
            linearity_index: Some(nodes as f64 - 1.0),
            branching_index: Some(0.0),
            clustering_index: Some(x),
        }
    }

    /// Two tight, well separated blobs of `per_blob` trees each, ids from 0.
    fn two_blobs(per_blob: usize) -> TreeSummaries {
        let mut summaries = TreeSummaries::new();
        for i in 0..per_blob {
            let jx = ((i * 37) % 11) as f64 * 0.001;
            let jy = ((i * 53) % 13) as f64 * 0.001;
            summaries.insert(i, branching_tree(0.20 + jx, 0.30 + jy, 4));
        }
        for i in 0..per_blob {
            let jx = ((i * 41) % 13) as f64 * 0.001;
            let jy = ((i * 29) % 11) as f64 * 0.001;
            summaries.insert(per_blob + i, branching_tree(0.70 + jx, 0.60 + jy, 5));
        }
        summaries
    }

    fn assert_partition(clusters: &ClusterMap, summaries: &TreeSummaries) {
        let mut seen: Vec<usize> = clusters
            .values()
            .flat_map(|c| c.members.iter().copied())
            .collect();
        seen.sort_unstable();
        let expected: Vec<usize> = summaries.keys().copied().collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_linear_trees_grouped_by_node_count() -> Result<()> {
        let mut summaries = TreeSummaries::new();
        summaries.insert(0, linear_tree(0.10, 3));
        summaries.insert(1, linear_tree(0.40, 3));
        summaries.insert(2, linear_tree(0.25, 5));

        let clusters =
            TreeClusterer::new().find_clusters::<PrecomputedIndices>(&mut summaries, None)?;

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters["linear_3"].members, vec![0, 1]);
        assert_eq!(clusters["linear_5"].members, vec![2]);
        assert_eq!(clusters["linear_5"].representative_tree, 2);
        for cluster in clusters.values() {
            assert!(cluster.is_linear);
            // No branching trees at all, so the minor axis falls to the floor.
            assert_eq!(cluster.ellipse.minor_axis, 0.01);
        }
        Ok(())
    }

    #[test]
    fn test_all_linear_same_node_count() -> Result<()> {
        let mut summaries = TreeSummaries::new();
        for (id, x) in [0.1, 0.2, 0.2, 0.35].into_iter().enumerate() {
            summaries.insert(id, linear_tree(x, 4));
        }

        let clusters =
            TreeClusterer::new().find_clusters::<PrecomputedIndices>(&mut summaries, None)?;

        assert_eq!(clusters.len(), 1);
        let cluster = &clusters["linear_4"];
        assert_eq!(cluster.members, vec![0, 1, 2, 3]);
        assert_eq!(cluster.responsibilities, vec![1.0; 4]);
        assert!(cluster.members.contains(&cluster.representative_tree));
        Ok(())
    }

    #[test]
    fn test_two_blobs_select_two_components() -> Result<()> {
        let mut summaries = two_blobs(20);
        let clusters = TreeClusterer::new()
            .with_seed(11)
            .find_clusters::<PrecomputedIndices>(&mut summaries, None)?;

        assert_eq!(clusters.len(), 2);
        assert!(clusters.contains_key("1"));
        assert!(clusters.contains_key("2"));

        let weights: f64 = clusters.values().filter_map(|c| c.weight).sum();
        assert!((weights - 1.0).abs() < 1e-6);

        for cluster in clusters.values() {
            assert!(!cluster.is_linear);
            assert_eq!(cluster.members.len(), 20);
            let low = cluster.members.iter().all(|&id| id < 20);
            let high = cluster.members.iter().all(|&id| id >= 20);
            assert!(low || high);
        }
        assert_partition(&clusters, &summaries);
        Ok(())
    }

    /// Five trees: three around (0.2, 0.31), two around (0.71, 0.6).
    fn five_trees() -> TreeSummaries {
        let points = [
            (0.20, 0.30),
            (0.21, 0.32),
            (0.19, 0.31),
            (0.70, 0.60),
            (0.72, 0.61),
        ];
        points
            .iter()
            .enumerate()
            .map(|(id, &(x, y))| (id, branching_tree(x, y, 4)))
            .collect()
    }

    fn assert_blob_pure(clusters: &ClusterMap) {
        for cluster in clusters.values() {
            let low = cluster.members.iter().all(|&id| id < 3);
            let high = cluster.members.iter().all(|&id| id >= 3);
            assert!(low || high, "mixed cluster {:?}", cluster.members);
        }
    }

    #[test]
    fn test_five_trees_two_components_when_sweep_is_capped() -> Result<()> {
        let mut summaries = five_trees();
        let clusters = TreeClusterer::new()
            .with_seed(4)
            .with_max_components(2)
            .find_clusters::<PrecomputedIndices>(&mut summaries, None)?;

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters["1"].members.len() + clusters["2"].members.len(), 5);
        let mut weights: Vec<f64> = clusters.values().filter_map(|c| c.weight).collect();
        weights.sort_by(f64::total_cmp);
        assert!((weights[0] - 0.4).abs() < 1e-6);
        assert!((weights[1] - 0.6).abs() < 1e-6);
        assert_blob_pure(&clusters);
        assert_partition(&clusters, &summaries);
        Ok(())
    }

    #[test]
    fn test_five_trees_full_sweep_splits_a_blob() -> Result<()> {
        // Sweep runs k = 1..=4. A component collapsed onto one or two trees only
        // carries `reg_covar` variance, so its density outweighs the BIC penalty:
        // BIC(2) ≈ -53.4, BIC(3) ≈ -60.4, BIC(4) ≈ -59.6 at the optimal partitions.
        let mut summaries = five_trees();
        let clusterer = TreeClusterer::new().with_seed(4);
        let clusters = clusterer.find_clusters::<PrecomputedIndices>(&mut summaries, None)?;

        assert!((3..=4).contains(&clusters.len()), "{} clusters", clusters.len());
        for cluster in clusters.values() {
            assert!(!cluster.members.is_empty());
        }
        let weights: f64 = clusters.values().filter_map(|c| c.weight).sum();
        assert!((weights - 1.0).abs() < 1e-6);
        assert_blob_pure(&clusters);
        assert_partition(&clusters, &summaries);
        Ok(())
    }

    #[test]
    fn test_five_trees_dirichlet_process() -> Result<()> {
        let mut summaries = five_trees();
        let options = VbgmmOptions {
            weight_concentration_prior_type: WeightConcentrationPriorType::DirichletProcess,
            ..Default::default()
        };
        let clusters = TreeClusterer::new()
            .with_seed(4)
            .find_clusters::<PrecomputedIndices>(&mut summaries, Some(&options))?;

        assert!(!clusters.is_empty());
        assert!(clusters.len() <= 5);
        for (key, cluster) in &clusters {
            let component: usize = key.parse().expect("numeric key");
            assert!(component < 50);
            assert!(!cluster.members.is_empty());
            assert_eq!(cluster.responsibilities.len(), 5);
        }
        assert_partition(&clusters, &summaries);
        Ok(())
    }

    #[test]
    fn test_responsibilities_normalize_per_tree() -> Result<()> {
        let mut summaries = two_blobs(15);
        let clusters = TreeClusterer::new()
            .with_seed(3)
            .find_clusters::<PrecomputedIndices>(&mut summaries, None)?;

        for i in 0..summaries.len() {
            let total: f64 = clusters.values().map(|c| c.responsibilities[i]).sum();
            assert!((total - 1.0).abs() < 1e-6, "tree {i} sums to {total}");
        }
        Ok(())
    }

    #[test]
    fn test_mixed_input_partitions_every_tree() -> Result<()> {
        let mut summaries = two_blobs(10);
        summaries.insert(100, linear_tree(0.3, 3));
        summaries.insert(101, linear_tree(0.5, 6));
        summaries.insert(102, linear_tree(0.4, 3));

        let clusters = TreeClusterer::new()
            .with_seed(5)
            .find_clusters::<PrecomputedIndices>(&mut summaries, None)?;

        assert_partition(&clusters, &summaries);
        assert_eq!(clusters["linear_3"].members, vec![100, 102]);
        assert_eq!(clusters["linear_6"].members, vec![101]);
        // Linear indicator vectors span the linear subset only.
        assert_eq!(clusters["linear_3"].responsibilities, vec![1.0, 0.0, 1.0]);
        // A tenth of the largest branching ratio among all trees.
        let minor = clusters["linear_6"].ellipse.minor_axis;
        assert!((minor - 0.061).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_dirichlet_process_drops_empty_components() -> Result<()> {
        let mut summaries = two_blobs(20);
        let options = VbgmmOptions {
            weight_concentration_prior_type: WeightConcentrationPriorType::DirichletProcess,
            weight_concentration_prior: Some(0.01),
            ..Default::default()
        };
        let clusters = TreeClusterer::new()
            .with_seed(17)
            .find_clusters::<PrecomputedIndices>(&mut summaries, Some(&options))?;

        assert!(!clusters.is_empty());
        assert!(clusters.len() <= 50);
        for (key, cluster) in &clusters {
            let component: usize = key.parse().expect("numeric key");
            assert!(component < 50);
            assert!(!cluster.members.is_empty());
            assert!(cluster.weight.is_some());
            assert_eq!(cluster.responsibilities.len(), 40);
        }
        assert_partition(&clusters, &summaries);
        Ok(())
    }

    #[test]
    fn test_prior_options_from_json() -> Result<()> {
        let options: VbgmmOptions = serde_json::from_str(
            r#"{"weight_concentration_prior": 0.001,
                "weight_concentration_prior_type": "dirichlet_distribution",
                "covariance_prior": 0.01}"#,
        )
        .expect("valid options");
        let mut summaries = two_blobs(10);
        let clusters = TreeClusterer::new()
            .with_seed(2)
            .find_clusters::<PrecomputedIndices>(&mut summaries, Some(&options))?;
        assert_partition(&clusters, &summaries);
        Ok(())
    }

    #[test]
    fn test_json_shape() -> Result<()> {
        let mut summaries = two_blobs(10);
        summaries.insert(50, linear_tree(0.3, 3));
        let clusters = TreeClusterer::new()
            .with_seed(9)
            .find_clusters::<PrecomputedIndices>(&mut summaries, None)?;

        let json = serde_json::to_value(&clusters).expect("serializable");
        let linear = &json["linear_3"];
        assert_eq!(linear["is_linear"], serde_json::json!(true));
        assert!(linear["weight"].is_null());
        assert!(linear["covariance"].is_null());
        assert_eq!(linear["members"], serde_json::json!([50]));
        assert_eq!(linear["representative_tree"], serde_json::json!(50));
        assert_eq!(linear["ellipse"]["angle"], serde_json::json!(0.0));

        let branching = &json["1"];
        assert!(branching["weight"].is_f64());
        assert_eq!(branching["covariance"].as_array().map(Vec::len), Some(2));
        assert_eq!(branching["mean"].as_array().map(Vec::len), Some(2));
        for field in ["mean", "angle", "major_axis", "minor_axis"] {
            assert!(!branching["ellipse"][field].is_null(), "missing {field}");
        }

        let back: ClusterMap = serde_json::from_value(json).expect("round trip");
        assert_eq!(back.len(), clusters.len());
        Ok(())
    }

    #[test]
    fn test_annotates_summaries_in_place() -> Result<()> {
        let mut summaries = two_blobs(5);
        TreeClusterer::new()
            .with_seed(1)
            .find_clusters::<PrecomputedIndices>(&mut summaries, None)?;
        assert!(summaries
            .values()
            .all(|s| s.clustering_index.is_some() && s.branching_index.is_some()));
        Ok(())
    }

    #[test]
    fn test_empty_input() -> Result<()> {
        let mut summaries = TreeSummaries::new();
        let clusters =
            TreeClusterer::new().find_clusters::<PrecomputedIndices>(&mut summaries, None)?;
        assert!(clusters.is_empty());
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_clusters_partition_trees(
            branching in prop::collection::vec((0.05f64..0.95, 0.05f64..0.95), 0..10),
            linear in prop::collection::vec((0.05f64..0.95, 2usize..6), 0..8),
        ) {
            let mut summaries = TreeSummaries::new();
            for (x, y) in &branching {
                summaries.insert(summaries.len(), branching_tree(*x, *y, 4));
            }
            for (x, nodes) in &linear {
                summaries.insert(summaries.len(), linear_tree(*x, *nodes));
            }

            let clusters = TreeClusterer::new()
                .with_seed(0)
                .with_max_components(4)
                .find_clusters::<PrecomputedIndices>(&mut summaries, None)
                .unwrap();

            assert_partition(&clusters, &summaries);
            for (key, cluster) in &clusters {
                prop_assert!(cluster.ellipse.major_axis >= cluster.ellipse.minor_axis);
                prop_assert!(cluster.ellipse.minor_axis >= 0.0);
                prop_assert!(cluster.members.contains(&cluster.representative_tree));
                if let Some(nodes) = key.strip_prefix("linear_") {
                    let nodes: usize = nodes.parse().unwrap();
                    for id in &cluster.members {
                        prop_assert_eq!(summaries[id].node_count(), nodes);
                    }
                }
            }
        }
    }
}
