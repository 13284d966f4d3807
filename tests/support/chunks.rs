#![allow(dead_code)]

use std::collections::HashMap;

use lidar_chunk_merge::{ChunkGroup, Label, Point3, PointTable};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Table with `x`, `y`, `z` and a `preds` label column.
pub fn table(points: &[(f64, f64, f64, Label)]) -> PointTable {
    PointTable::from_labeled_points(
        "preds",
        points.iter().map(|&(x, y, z, l)| (Point3::new(x, y, z), l)),
    )
}

/// Square tiles of a synthetic forest.
pub struct TiledForest {
    pub group: ChunkGroup,
    pub trees: usize,
    pub points: usize,
}

/// Scatter `trees` disk-shaped crowns over a `tiles × tiles` grid of square
/// tiles and cut them along tile boundaries, labelling each crown piece
/// with a tile-local id. About one point in ten is noise (label 0).
///
/// Odd tiles carry an extra `intensity` column.
pub fn tiled_forest(
    seed: u64,
    tiles: usize,
    tile_size: f64,
    trees: usize,
    points_per_tree: usize,
) -> TiledForest {
    assert!(tiles > 0, "a forest needs at least one tile");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let extent = tiles as f64 * tile_size;

    // (tile) -> (points, labels, tree -> local label)
    let mut per_tile: HashMap<(usize, usize), (Vec<Point3>, Vec<Label>, HashMap<usize, Label>)> =
        HashMap::new();
    let mut total = 0;

    for tree in 0..trees {
        let cx = rng.gen_range(0.0..extent);
        let cy = rng.gen_range(0.0..extent);
        let radius = rng.gen_range(0.3..0.8);
        for _ in 0..points_per_tree {
            let r = radius * rng.gen::<f64>().sqrt();
            let theta = rng.gen_range(0.0..std::f64::consts::TAU);
            let x = (cx + r * theta.cos()).clamp(0.0, extent - 1e-9);
            let y = (cy + r * theta.sin()).clamp(0.0, extent - 1e-9);
            let z = rng.gen_range(0.0..12.0);
            let tile = (
                ((x / tile_size) as usize).min(tiles - 1),
                ((y / tile_size) as usize).min(tiles - 1),
            );
            let noise = rng.gen_bool(0.1);

            let entry = per_tile.entry(tile).or_default();
            let next = entry.2.len() as Label + 1;
            let label = if noise {
                0
            } else {
                *entry.2.entry(tree).or_insert(next)
            };
            entry.0.push(Point3::new(x, y, z));
            entry.1.push(label);
            total += 1;
        }
    }

    let mut group = ChunkGroup::new(format!("forest_{seed}"));
    for ((ix, iy), (points, labels, _)) in per_tile {
        let mut t = PointTable::from_labeled_points("preds", points.into_iter().zip(labels));
        if (ix + iy) % 2 == 1 {
            let n = t.num_rows();
            t.insert_column("intensity", (0..n).map(|i| i as f64).collect());
        }
        group.chunks.insert(format!("tile_{ix:02}_{iy:02}"), t);
    }

    TiledForest {
        group,
        trees,
        points: total,
    }
}

/// Dense run of points along x from `x0` to `x1` at height `z`, spaced `step` apart.
pub fn line_points(
    x0: f64,
    x1: f64,
    y: f64,
    z: f64,
    step: f64,
    label: Label,
) -> Vec<(f64, f64, f64, Label)> {
    let n = ((x1 - x0) / step).round() as usize;
    (0..=n).map(|i| (x0 + i as f64 * step, y, z, label)).collect()
}
