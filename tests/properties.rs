//! Invariants of the merge that must hold for any input.
//!
//! Inputs are synthetic tiled forests with fixed seeds.

mod support;

use lidar_chunk_merge::{merge_group, LabelUnifier, MatchStrategy, MergeConfig, NOISE_LABEL};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use support::chunks::tiled_forest;

fn config(strategy: MatchStrategy) -> MergeConfig {
    MergeConfig {
        strategy,
        // Coarser threshold so the sparse synthetic crowns produce matches.
        threshold_distance: 0.1,
        ..Default::default()
    }
}

#[test]
fn test_grid_and_exhaustive_agree() {
    for seed in [1, 2, 3, 4] {
        let forest = tiled_forest(seed, 3, 1.5, 50, 150);
        let ex = merge_group(&forest.group, &config(MatchStrategy::Exhaustive)).unwrap();
        let grid = merge_group(&forest.group, &config(MatchStrategy::Grid)).unwrap();

        assert_eq!(ex.unions, grid.unions, "seed {seed}");
        assert_eq!(ex.table.instance_labels, grid.table.instance_labels, "seed {seed}");
        assert_eq!(ex.instances, grid.instances, "seed {seed}");
        assert_eq!(ex.matching.correspondences, grid.matching.correspondences);
        assert!(grid.matching.comparisons <= ex.matching.comparisons);
    }
}

#[test]
fn test_border_trees_are_merged() {
    let forest = tiled_forest(21, 3, 1.5, 50, 300);
    let out = merge_group(&forest.group, &config(MatchStrategy::Grid)).unwrap();
    assert!(!out.unions.is_empty());
    assert!(out.instances.len() < out.offsets.max_label() as usize);
}

#[test]
fn test_union_order_independent() {
    let forest = tiled_forest(7, 4, 1.0, 80, 150);
    let out = merge_group(&forest.group, &config(MatchStrategy::Grid)).unwrap();
    let max = out.offsets.max_label();

    let mut reference = LabelUnifier::new(max);
    reference.apply(&out.unions);
    let expected = reference.resolve_all();

    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let mut requests = out.unions.clone();
    for _ in 0..8 {
        requests.shuffle(&mut rng);
        let mut uf = LabelUnifier::new(max);
        uf.apply(&requests);
        assert_eq!(uf.resolve_all(), expected);
    }

    requests.reverse();
    let mut uf = LabelUnifier::new(max);
    uf.apply(&requests);
    assert_eq!(uf.resolve_all(), expected);
}

#[test]
fn test_final_label_is_find_of_global() {
    let forest = tiled_forest(13, 3, 1.5, 60, 120);
    let out = merge_group(&forest.group, &config(MatchStrategy::Grid)).unwrap();

    let mut uf = LabelUnifier::new(out.offsets.max_label());
    uf.apply(&out.unions);

    for i in 0..out.table.len() {
        let chunk = out.table.chunk_index[i] as usize;
        let local = out.table.local_labels[i];
        let global = out.label_maps[chunk].to_global(local).unwrap();
        let canonical = uf.find(global);
        assert_eq!(out.table.instance_labels[i], canonical);
        assert_eq!(uf.find(canonical), canonical);
        assert!(canonical <= global);
    }
}

#[test]
fn test_noise_never_merged_or_summarised() {
    let forest = tiled_forest(17, 3, 1.5, 60, 120);
    let out = merge_group(&forest.group, &config(MatchStrategy::Grid)).unwrap();

    assert!(out.unions.iter().all(|r| r.a != NOISE_LABEL && r.b != NOISE_LABEL));
    assert!(out.instances.iter().all(|s| s.canonical_label != NOISE_LABEL));
    for (local, canonical) in out.table.local_labels.iter().zip(&out.table.instance_labels) {
        assert_eq!(*local == NOISE_LABEL, *canonical == NOISE_LABEL);
    }
}

#[test]
fn test_summary_sorted_and_counts_match() {
    let forest = tiled_forest(19, 2, 2.0, 40, 100);
    let out = merge_group(&forest.group, &config(MatchStrategy::Grid)).unwrap();

    assert!(out
        .instances
        .windows(2)
        .all(|w| w[0].canonical_label < w[1].canonical_label));
    for s in &out.instances {
        let count = out
            .table
            .instance_labels
            .iter()
            .filter(|&&l| l == s.canonical_label)
            .count();
        assert_eq!(count, s.point_count);
    }
}
