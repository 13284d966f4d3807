//! Cross-chunk border matching.
//!
//! For every unordered pair of chunks in a group, border points of one chunk
//! are compared with border points of the other. A pair of points closer
//! than `threshold_distance` (strictly, in 3D) yields a union request for
//! their global labels. The result is the sorted, deduplicated set of
//! requests; both strategies produce the same set.
//!
//! The grid strategy buckets border points into cubic cells of edge just
//! above `threshold_distance` and only compares a cell with the 3×3×3 block
//! around it. Any two points closer than the edge length differ by at most
//! one cell index per axis, so no correspondence is lost. Sets with
//! coordinates too large for an exact cell index are matched exhaustively.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::border::BorderFlags;
use crate::error::MergeError;
use crate::par::{maybe_par_iter, maybe_par_range};
use crate::table::Chunk;
use crate::types::{BoundingBox, Label, Point3, NOISE_LABEL};
use crate::union_find::UnionRequest;

/// How candidate point pairs are enumerated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Compare every border point of one chunk with every border point of the other.
    Exhaustive,
    /// Compare only points in the same or adjacent grid cells.
    #[default]
    Grid,
}

/// Labelled border points of one chunk, in global label space.
///
/// Noise points are dropped: they can never produce a union.
#[derive(Debug, Clone, Default)]
pub struct BorderPoints {
    points: Vec<Point3>,
    labels: Vec<Label>,
    bbox: Option<BoundingBox>,
}

impl BorderPoints {
    pub fn collect(chunk: &Chunk, flags: &BorderFlags, global_labels: &[Label]) -> Self {
        debug_assert_eq!(chunk.len(), flags.len());
        debug_assert_eq!(chunk.len(), global_labels.len());
        let mut points = Vec::new();
        let mut labels = Vec::new();
        for (i, (&p, &l)) in chunk.points().iter().zip(global_labels).enumerate() {
            if l != NOISE_LABEL && flags.is_border(i) {
                points.push(p);
                labels.push(l);
            }
        }
        let bbox = BoundingBox::from_points(&points);
        Self {
            points,
            labels,
            bbox,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

type CellKey = [i64; 3];

/// Largest scaled coordinate (in cells) a grid accepts.
const MAX_CELL_INDEX: f64 = (1u64 << 40) as f64;

/// Cells are grown slightly past the threshold so rounding in the scaled
/// coordinates cannot push two matching points two cells apart.
const CELL_MARGIN: f64 = 1.0 + 1e-3;

/// Sparse uniform grid over one chunk's border points.
struct BorderGrid {
    inv_cell: f64,
    cells: FxHashMap<CellKey, Vec<u32>>,
}

impl BorderGrid {
    /// Bucket `points` into cells of at least `threshold`.
    ///
    /// Returns `None` when a coordinate is too far from the origin for an
    /// exact cell index; such sets are matched exhaustively.
    fn new(points: &[Point3], threshold: f64) -> Option<Self> {
        let inv_cell = 1.0 / (threshold * CELL_MARGIN);
        let mut cells: FxHashMap<CellKey, Vec<u32>> = FxHashMap::default();
        for (i, p) in points.iter().enumerate() {
            let key = Self::key(*p, inv_cell)?;
            cells.entry(key).or_default().push(i as u32);
        }
        Some(Self { inv_cell, cells })
    }

    #[inline]
    fn key(p: Point3, inv_cell: f64) -> Option<CellKey> {
        let index = |v: f64| {
            let scaled = (v * inv_cell).floor();
            (scaled.abs() <= MAX_CELL_INDEX).then_some(scaled as i64)
        };
        Some([index(p.x)?, index(p.y)?, index(p.z)?])
    }

    /// Occupied cells in the 3×3×3 block around `key`.
    fn neighborhood(&self, key: CellKey) -> impl Iterator<Item = &[u32]> + '_ {
        (-1i64..=1).flat_map(move |dx| {
            (-1i64..=1).flat_map(move |dy| {
                (-1i64..=1).filter_map(move |dz| {
                    self.cells
                        .get(&[key[0] + dx, key[1] + dy, key[2] + dz])
                        .map(Vec::as_slice)
                })
            })
        })
    }
}

/// One chunk pair scheduled for comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairPlan {
    pub first: usize,
    pub second: usize,
    /// Point-pair distance evaluations this pair will cost.
    pub planned: u64,
}

/// Output of border matching for one group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutput {
    /// Sorted, deduplicated union requests.
    pub requests: Vec<UnionRequest>,
    pub pairs_compared: usize,
    pub comparisons: u64,
    /// Point pairs found within the threshold (before label deduplication).
    pub correspondences: u64,
}

/// Matching parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchParams {
    pub threshold_distance: f64,
    pub strategy: MatchStrategy,
    pub max_comparisons: Option<u64>,
}

/// Find border correspondences between all chunk pairs and return the union requests.
///
/// All pairs are planned first; if the planned comparison count exceeds
/// `max_comparisons` the whole group fails before any distance is evaluated.
pub fn match_borders(
    sets: &[BorderPoints],
    params: MatchParams,
) -> Result<MatchOutput, MergeError> {
    let threshold = params.threshold_distance;
    if !(threshold > 0.0) || sets.len() < 2 {
        return Ok(MatchOutput::default());
    }

    let grids: Vec<Option<BorderGrid>> = match params.strategy {
        MatchStrategy::Exhaustive => Vec::new(),
        MatchStrategy::Grid => maybe_par_iter!(sets)
            .map(|s| BorderGrid::new(&s.points, threshold))
            .collect(),
    };
    let ungridded = grids.iter().filter(|g| g.is_none()).count();
    if params.strategy == MatchStrategy::Grid && ungridded > 0 {
        tracing::debug!(
            sets = ungridded,
            "coordinates out of grid range, matching exhaustively"
        );
    }

    let plans = plan_pairs(sets, &grids, threshold);
    let planned: u64 = plans.iter().map(|p| p.planned).sum();
    if let Some(budget) = params.max_comparisons {
        if planned > budget {
            return Err(MergeError::ComparisonBudgetExceeded { planned, budget });
        }
    }

    let threshold_sq = threshold * threshold;
    // Every pair finishes before the requests are merged and handed on.
    let per_pair: Vec<(Vec<UnionRequest>, u64)> = maybe_par_iter!(plans)
        .map(|plan| {
            let a = &sets[plan.first];
            let b = &sets[plan.second];
            match pair_grids(&grids, plan.first, plan.second) {
                Some((grid_a, grid_b)) => match_pair_grid(a, b, grid_a, grid_b, threshold_sq),
                None => match_pair_exhaustive(a, b, threshold_sq),
            }
        })
        .collect();

    let mut requests: Vec<UnionRequest> = Vec::new();
    let mut correspondences = 0u64;
    for (reqs, found) in per_pair {
        requests.extend(reqs);
        correspondences += found;
    }
    requests.sort_unstable();
    requests.dedup();

    tracing::debug!(
        pairs = plans.len(),
        comparisons = planned,
        correspondences,
        unions = requests.len(),
        "border matching finished"
    );

    Ok(MatchOutput {
        requests,
        pairs_compared: plans.len(),
        comparisons: planned,
        correspondences,
    })
}

/// Grids of both sets, if both could be built.
#[inline]
fn pair_grids(
    grids: &[Option<BorderGrid>],
    i: usize,
    j: usize,
) -> Option<(&BorderGrid, &BorderGrid)> {
    Some((grids.get(i)?.as_ref()?, grids.get(j)?.as_ref()?))
}

/// All chunk pairs whose border points can come within `threshold` of each other.
fn plan_pairs(
    sets: &[BorderPoints],
    grids: &[Option<BorderGrid>],
    threshold: f64,
) -> Vec<PairPlan> {
    let n = sets.len();
    let candidates: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .filter(|&(i, j)| match (sets[i].bbox, sets[j].bbox) {
            (Some(a), Some(b)) => a.expanded(threshold).intersects(&b),
            _ => false,
        })
        .collect();

    maybe_par_range!(0..candidates.len())
        .map(|k| {
            let (i, j) = candidates[k];
            let planned = match pair_grids(grids, i, j) {
                Some((grid_a, grid_b)) => planned_grid(grid_a, grid_b),
                None => sets[i].len() as u64 * sets[j].len() as u64,
            };
            PairPlan {
                first: i,
                second: j,
                planned,
            }
        })
        .collect()
}

fn planned_grid(a: &BorderGrid, b: &BorderGrid) -> u64 {
    a.cells
        .iter()
        .map(|(&key, members)| {
            let near: usize = b.neighborhood(key).map(<[u32]>::len).sum();
            members.len() as u64 * near as u64
        })
        .sum()
}

fn match_pair_exhaustive(
    a: &BorderPoints,
    b: &BorderPoints,
    threshold_sq: f64,
) -> (Vec<UnionRequest>, u64) {
    let mut found = 0u64;
    let mut seen: FxHashSet<UnionRequest> = FxHashSet::default();
    for (pa, &la) in a.points.iter().zip(&a.labels) {
        for (pb, &lb) in b.points.iter().zip(&b.labels) {
            if pa.distance_squared(*pb) < threshold_sq {
                found += 1;
                if let Some(r) = UnionRequest::new(la, lb) {
                    seen.insert(r);
                }
            }
        }
    }
    (seen.into_iter().collect(), found)
}

fn match_pair_grid(
    a: &BorderPoints,
    b: &BorderPoints,
    grid_a: &BorderGrid,
    grid_b: &BorderGrid,
    threshold_sq: f64,
) -> (Vec<UnionRequest>, u64) {
    debug_assert_eq!(grid_a.inv_cell, grid_b.inv_cell);
    let mut found = 0u64;
    let mut seen: FxHashSet<UnionRequest> = FxHashSet::default();
    for (&key, members) in &grid_a.cells {
        for near in grid_b.neighborhood(key) {
            for &ia in members {
                let pa = a.points[ia as usize];
                let la = a.labels[ia as usize];
                for &ib in near {
                    if pa.distance_squared(b.points[ib as usize]) < threshold_sq {
                        found += 1;
                        if let Some(r) = UnionRequest::new(la, b.labels[ib as usize]) {
                            seen.insert(r);
                        }
                    }
                }
            }
        }
    }
    (seen.into_iter().collect(), found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::border::detect_borders;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn border_points(id: &str, pts: &[(f64, f64, f64, Label)], epsilon: f64) -> BorderPoints {
        let chunk = Chunk::from_points(
            id,
            pts.iter().map(|&(x, y, z, l)| (Point3::new(x, y, z), l)),
        );
        let info = detect_borders(&chunk, epsilon);
        BorderPoints::collect(&chunk, &info.flags, chunk.labels())
    }

    fn params(strategy: MatchStrategy) -> MatchParams {
        MatchParams {
            threshold_distance: 0.02,
            strategy,
            max_comparisons: None,
        }
    }

    #[test]
    fn test_single_correspondence() {
        let a = border_points("a", &[(0.0, 5.0, 1.0, 1), (0.995, 5.0, 1.0, 2)], 0.05);
        let b = border_points("b", &[(1.0, 5.0, 1.0, 3), (2.0, 5.0, 1.0, 3)], 0.05);
        for strategy in [MatchStrategy::Exhaustive, MatchStrategy::Grid] {
            let out = match_borders(&[a.clone(), b.clone()], params(strategy)).unwrap();
            assert_eq!(out.requests, vec![UnionRequest { a: 2, b: 3 }]);
            assert_eq!(out.correspondences, 1);
            assert_eq!(out.pairs_compared, 1);
        }
    }

    #[test]
    fn test_distance_is_strict() {
        let a = border_points("a", &[(0.0, 0.0, 0.0, 1), (1.0, 0.0, 0.0, 1)], 0.05);
        let b = border_points("b", &[(1.5, 0.0, 0.0, 2), (1.0, 0.0, 0.5, 2)], 0.05);
        let out = match_borders(
            &[a, b],
            MatchParams {
                threshold_distance: 0.5,
                ..params(MatchStrategy::Exhaustive)
            },
        )
        .unwrap();
        assert!(out.requests.is_empty());
    }

    #[test]
    fn test_noise_points_never_match() {
        let a = border_points("a", &[(0.0, 0.0, 0.0, 1), (1.0, 0.0, 0.0, 0)], 0.05);
        let b = border_points("b", &[(1.001, 0.0, 0.0, 2), (2.0, 0.0, 0.0, 2)], 0.05);
        let out = match_borders(&[a, b], params(MatchStrategy::Grid)).unwrap();
        assert!(out.requests.is_empty());
    }

    #[test]
    fn test_far_pairs_are_culled() {
        let a = border_points("a", &[(0.0, 0.0, 0.0, 1), (1.0, 1.0, 0.0, 1)], 0.05);
        let b = border_points("b", &[(5.0, 5.0, 0.0, 2), (6.0, 6.0, 0.0, 2)], 0.05);
        let out = match_borders(&[a, b], params(MatchStrategy::Exhaustive)).unwrap();
        assert_eq!(out.pairs_compared, 0);
        assert_eq!(out.comparisons, 0);
    }

    #[test]
    fn test_budget_exceeded_fails_group() {
        let a = border_points("a", &[(0.0, 0.0, 0.0, 1), (1.0, 0.0, 0.0, 1)], 0.05);
        let b = border_points("b", &[(1.01, 0.0, 0.0, 2), (2.0, 0.0, 0.0, 2)], 0.05);
        let err = match_borders(
            &[a, b],
            MatchParams {
                max_comparisons: Some(3),
                ..params(MatchStrategy::Exhaustive)
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            MergeError::ComparisonBudgetExceeded {
                planned: 4,
                budget: 3
            }
        );
    }

    #[test]
    fn test_grid_plans_fewer_comparisons() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mk = |rng: &mut ChaCha8Rng, x0: f64, base: Label| -> Vec<(f64, f64, f64, Label)> {
            (0..400)
                .map(|_| {
                    (
                        x0 + rng.gen_range(0.0..1.0),
                        rng.gen_range(0.0..1.0),
                        rng.gen_range(0.0..1.0),
                        base + rng.gen_range(0..4),
                    )
                })
                .collect()
        };
        let a = border_points("a", &mk(&mut rng, 0.0, 1), 0.5);
        let b = border_points("b", &mk(&mut rng, 0.99, 10), 0.5);

        let ex =
            match_borders(&[a.clone(), b.clone()], params(MatchStrategy::Exhaustive)).unwrap();
        let grid = match_borders(&[a, b], params(MatchStrategy::Grid)).unwrap();
        assert_eq!(ex.requests, grid.requests);
        assert_eq!(ex.correspondences, grid.correspondences);
        assert!(grid.comparisons < ex.comparisons);
    }

    #[test]
    fn test_zero_threshold_matches_nothing() {
        let a = border_points("a", &[(1.0, 0.0, 0.0, 1)], 0.05);
        let b = border_points("b", &[(1.0, 0.0, 0.0, 2)], 0.05);
        let out = match_borders(
            &[a, b],
            MatchParams {
                threshold_distance: 0.0,
                ..params(MatchStrategy::Grid)
            },
        )
        .unwrap();
        assert!(out.requests.is_empty());
    }

    #[test]
    fn test_far_coordinates_match_like_exhaustive() {
        for z in [1e300, -1e300, 1e18] {
            let a = border_points("a", &[(0.0, 5.0, z, 1), (0.995, 5.0, z, 2)], 0.05);
            let b = border_points("b", &[(1.0, 5.0, z, 3), (2.0, 5.0, z, 3)], 0.05);
            let ex =
                match_borders(&[a.clone(), b.clone()], params(MatchStrategy::Exhaustive)).unwrap();
            let grid = match_borders(&[a, b], params(MatchStrategy::Grid)).unwrap();
            assert_eq!(ex.requests, vec![UnionRequest { a: 2, b: 3 }], "z = {z}");
            assert_eq!(grid.requests, ex.requests, "z = {z}");
            assert_eq!(grid.correspondences, ex.correspondences, "z = {z}");
        }
    }

    #[test]
    fn test_grid_key_range() {
        let inv_cell = 1.0 / 0.02;
        assert!(BorderGrid::key(Point3::new(1.0, -1.0, 1e9), inv_cell).is_some());
        assert!(BorderGrid::key(Point3::new(1.0, 1.0, 1e300), inv_cell).is_none());
        assert!(BorderGrid::key(Point3::new(-1e300, 1.0, 1.0), inv_cell).is_none());
    }
}
