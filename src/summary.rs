//! Per-instance and per-chunk summaries.

use glam::DVec3;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::border::BorderInfo;
use crate::remap::LabelMap;
use crate::table::{Chunk, MergedPointTable};
use crate::types::{BoundingBox, Label, Point3, NOISE_LABEL};

/// Mean position, rounded to the configured number of decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One merged tree instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSummary {
    pub canonical_label: Label,
    pub centroid: Centroid,
    pub point_count: usize,
}

/// Round half away from zero to `decimals` places.
#[inline]
pub fn round_to(v: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (v * scale).round() / scale
}

#[derive(Clone, Copy, Default)]
struct Accum {
    sum: DVec3,
    count: usize,
}

impl Accum {
    #[inline]
    fn add(&mut self, p: Point3) {
        self.sum += p.to_glam();
        self.count += 1;
    }

    fn centroid(&self, decimals: u32) -> Centroid {
        let mean = self.sum / self.count as f64;
        Centroid {
            x: round_to(mean.x, decimals),
            y: round_to(mean.y, decimals),
            z: round_to(mean.z, decimals),
        }
    }
}

fn accumulate<'a, I>(points: I) -> FxHashMap<Label, Accum>
where
    I: IntoIterator<Item = (&'a Point3, Label)>,
{
    let mut groups: FxHashMap<Label, Accum> = FxHashMap::default();
    for (p, label) in points {
        if label != NOISE_LABEL {
            groups.entry(label).or_default().add(*p);
        }
    }
    groups
}

/// Centroid and point count per canonical label, ascending by label. Noise is excluded.
pub fn summarize(table: &MergedPointTable, decimals: u32) -> Vec<InstanceSummary> {
    let groups = accumulate(table.points.iter().zip(table.instance_labels.iter().copied()));
    let mut out: Vec<InstanceSummary> = groups
        .into_iter()
        .map(|(label, acc)| InstanceSummary {
            canonical_label: label,
            centroid: acc.centroid(decimals),
            point_count: acc.count,
        })
        .collect();
    out.sort_unstable_by_key(|s| s.canonical_label);
    out
}

/// A tree instance that touches the chunk border.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BorderInstance {
    pub local_label: Label,
    pub global_label: Label,
    /// Centroid of all of the instance's points in this chunk.
    pub centroid: Centroid,
}

/// Per-chunk statistics written next to the instance summaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkReport {
    pub chunk_id: String,
    pub point_count: usize,
    pub centroid: Centroid,
    pub bbox: Option<BoundingBox>,
    pub label_count: usize,
    pub global_start: Label,
    pub border_point_count: usize,
    pub border_instances: Vec<BorderInstance>,
}

/// Summarise one chunk after border detection and remapping.
pub fn chunk_report(
    chunk: &Chunk,
    border: &BorderInfo,
    map: &LabelMap,
    decimals: u32,
) -> ChunkReport {
    let flags = &border.flags;
    let mut all = Accum::default();
    for p in chunk.points() {
        all.add(*p);
    }

    let per_label = accumulate(chunk.points().iter().zip(chunk.labels().iter().copied()));

    let mut border_labels: Vec<Label> = chunk
        .labels()
        .iter()
        .enumerate()
        .filter(|&(i, &l)| l != NOISE_LABEL && flags.is_border(i))
        .map(|(_, &l)| l)
        .collect();
    border_labels.sort_unstable();
    border_labels.dedup();

    let border_instances = border_labels
        .into_iter()
        .filter_map(|local| {
            let acc = per_label.get(&local)?;
            Some(BorderInstance {
                local_label: local,
                global_label: map.to_global(local)?,
                centroid: acc.centroid(decimals),
            })
        })
        .collect();

    ChunkReport {
        chunk_id: chunk.id().to_owned(),
        point_count: chunk.len(),
        centroid: all.centroid(decimals),
        bbox: border.bbox,
        label_count: map.count(),
        global_start: map.start(),
        border_point_count: flags.count(),
        border_instances,
    }
}
