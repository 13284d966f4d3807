//! Group merge driver.
//!
//! Phases for one group:
//! 1. validate tables, skip empty chunks;
//! 2. per chunk (parallel): border flags, distinct labels; then the offset
//!    table in processing order, global labels and chunk reports;
//! 3. border matching over all chunk pairs (parallel, collected before use);
//! 4. union-find resolution of the collected requests;
//! 5. relabel and concatenate;
//! 6. instance summaries.
//!
//! Processing order is ascending chunk id. Repeated runs on identical input
//! give identical global ids and canonical labels.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;

use crate::border::{detect_borders, BorderInfo};
use crate::config::MergeConfig;
use crate::error::{MergeError, MergeWarning};
use crate::matcher::{match_borders, BorderPoints, MatchOutput};
use crate::par::maybe_par_iter;
use crate::remap::{distinct_labels, LabelMap, LabelOffset, LabelOffsetTable};
use crate::summary::{chunk_report, summarize, ChunkReport, InstanceSummary};
use crate::table::{Chunk, MergedPointTable, PointTable};
use crate::timing::{LapTimer, MergeTimings, Phase};
use crate::types::Label;
use crate::union_find::{LabelUnifier, UnionRequest};

/// Chunks of one survey, keyed by chunk id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkGroup {
    pub group_id: String,
    pub chunks: BTreeMap<String, PointTable>,
}

impl ChunkGroup {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            chunks: BTreeMap::new(),
        }
    }

    pub fn with_chunk(mut self, chunk_id: impl Into<String>, table: PointTable) -> Self {
        self.chunks.insert(chunk_id.into(), table);
        self
    }
}

/// Everything produced for one merged group.
#[derive(Debug, Clone)]
pub struct GroupOutput {
    pub group_id: String,
    pub table: MergedPointTable,
    /// One entry per canonical label, ascending.
    pub instances: Vec<InstanceSummary>,
    /// One entry per merged chunk, in processing order.
    pub chunks: Vec<ChunkReport>,
    pub offsets: LabelOffsetTable,
    /// Local-to-global maps, aligned with `table.chunk_ids`.
    pub label_maps: Vec<LabelMap>,
    pub unions: Vec<UnionRequest>,
    pub matching: MatchOutputStats,
    pub warnings: Vec<MergeWarning>,
}

/// Counters from border matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchOutputStats {
    pub pairs_compared: usize,
    pub comparisons: u64,
    pub correspondences: u64,
}

impl From<&MatchOutput> for MatchOutputStats {
    fn from(m: &MatchOutput) -> Self {
        Self {
            pairs_compared: m.pairs_compared,
            comparisons: m.comparisons,
            correspondences: m.correspondences,
        }
    }
}

/// Structured side-channel report of one group.
#[derive(Debug, Serialize)]
pub struct GroupReport<'a> {
    pub group_id: &'a str,
    pub instances: &'a [InstanceSummary],
    pub chunks: &'a [ChunkReport],
    pub offsets: &'a [LabelOffset],
    pub matching: MatchOutputStats,
    pub warnings: &'a [MergeWarning],
}

impl GroupOutput {
    /// Conventional name of the report: `<group_id>_results`.
    pub fn results_name(&self) -> String {
        format!("{}_results", self.group_id)
    }

    pub fn report(&self) -> GroupReport<'_> {
        GroupReport {
            group_id: &self.group_id,
            instances: &self.instances,
            chunks: &self.chunks,
            offsets: self.offsets.entries(),
            matching: self.matching,
            warnings: &self.warnings,
        }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_report<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, &self.report())
    }

    pub fn label_map(&self, chunk_id: &str) -> Option<&LabelMap> {
        let i = self.table.chunk_ids.iter().position(|c| c == chunk_id)?;
        self.label_maps.get(i)
    }
}

/// Result of one group in a multi-group run.
#[derive(Debug)]
pub struct GroupResult {
    pub group_id: String,
    pub result: Result<GroupOutput, MergeError>,
}

/// Merge one chunk group.
pub fn merge_group(group: &ChunkGroup, config: &MergeConfig) -> Result<GroupOutput, MergeError> {
    config.validate()?;
    with_worker_pool(config, || merge_group_impl(group, config))?
}

/// Merge independent groups concurrently.
///
/// A fatal error only fails its own group. `cancel` is checked before each
/// group starts; groups not yet started when it is set report
/// [`MergeError::Cancelled`]. The outer error is reserved for an invalid
/// configuration or a worker pool that cannot be built.
pub fn merge_groups(
    groups: &[ChunkGroup],
    config: &MergeConfig,
    cancel: &AtomicBool,
) -> Result<Vec<GroupResult>, MergeError> {
    config.validate()?;
    with_worker_pool(config, || {
        maybe_par_iter!(groups)
            .map(|group| {
                let result = if cancel.load(Ordering::Relaxed) {
                    Err(MergeError::Cancelled)
                } else {
                    merge_group_impl(group, config)
                };
                if let Err(e) = &result {
                    tracing::error!(group = %group.group_id, error = %e, "group merge failed");
                }
                GroupResult {
                    group_id: group.group_id.clone(),
                    result,
                }
            })
            .collect()
    })
}

#[cfg(feature = "parallel")]
fn with_worker_pool<T, F>(config: &MergeConfig, f: F) -> Result<T, MergeError>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    match config.workers {
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| MergeError::WorkerPool(e.to_string()))?;
            Ok(pool.install(f))
        }
        None => Ok(f()),
    }
}

#[cfg(not(feature = "parallel"))]
fn with_worker_pool<T, F>(_config: &MergeConfig, f: F) -> Result<T, MergeError>
where
    F: FnOnce() -> T,
{
    Ok(f())
}

/// Phase-1 delta of one chunk. Workers only produce these; nothing shared is mutated.
struct ChunkDelta {
    border: BorderInfo,
    distinct: Vec<Label>,
}

fn load_chunks(
    group: &ChunkGroup,
    label_column: &str,
) -> Result<(Vec<Chunk>, Vec<MergeWarning>), MergeError> {
    let mut chunks = Vec::with_capacity(group.chunks.len());
    let mut warnings = Vec::new();
    for (chunk_id, table) in &group.chunks {
        if table.is_empty() {
            tracing::warn!(group = %group.group_id, chunk = %chunk_id, "skipping empty chunk");
            warnings.push(MergeWarning::EmptyChunk {
                chunk: chunk_id.clone(),
            });
            continue;
        }
        chunks.push(Chunk::from_table(chunk_id, table, label_column)?);
    }
    Ok((chunks, warnings))
}

fn merge_group_impl(group: &ChunkGroup, config: &MergeConfig) -> Result<GroupOutput, MergeError> {
    let mut timings = MergeTimings::default();
    let mut lap = LapTimer::start();

    let (chunks, warnings) = load_chunks(group, &config.label_column)?;
    timings.record(Phase::Load, lap.lap());

    let deltas: Vec<ChunkDelta> = maybe_par_iter!(chunks)
        .map(|chunk| ChunkDelta {
            border: detect_borders(chunk, config.epsilon),
            distinct: distinct_labels(chunk.labels()),
        })
        .collect();

    let offsets = LabelOffsetTable::build(
        chunks
            .iter()
            .zip(&deltas)
            .map(|(c, d)| (c.id(), d.distinct.len())),
        config.max_global_label,
    )?;

    let label_maps: Vec<LabelMap> = deltas
        .iter()
        .zip(offsets.entries())
        .map(|(d, o)| LabelMap::new(d.distinct.clone(), o.start))
        .collect();

    let indices: Vec<usize> = (0..chunks.len()).collect();
    let prepared: Vec<(Vec<Label>, BorderPoints, ChunkReport)> = maybe_par_iter!(indices)
        .map(|&i| {
            let chunk = &chunks[i];
            let info = &deltas[i].border;
            let global = label_maps[i].apply(chunk.labels());
            let border = BorderPoints::collect(chunk, &info.flags, &global);
            let report = chunk_report(chunk, info, &label_maps[i], config.centroid_decimals);
            (global, border, report)
        })
        .collect();

    let mut global_labels = Vec::with_capacity(prepared.len());
    let mut border_sets = Vec::with_capacity(prepared.len());
    let mut chunk_reports = Vec::with_capacity(prepared.len());
    for (global, border, report) in prepared {
        global_labels.push(global);
        border_sets.push(border);
        chunk_reports.push(report);
    }
    tracing::debug!(
        group = %group.group_id,
        chunks = chunks.len(),
        global_labels = offsets.max_label(),
        border_points = border_sets.iter().map(BorderPoints::len).sum::<usize>(),
        "chunks prepared"
    );
    timings.record(Phase::Prepare, lap.lap());

    let matching = match_borders(&border_sets, config.match_params())?;
    timings.record(Phase::Match, lap.lap());

    let mut unifier = LabelUnifier::new(offsets.max_label());
    let merged = unifier.apply(&matching.requests);
    let canonical = unifier.resolve_all();
    timings.record(Phase::Unify, lap.lap());

    let relabeled: Vec<Vec<Label>> = maybe_par_iter!(global_labels)
        .map(|global| global.iter().map(|&g| canonical[g as usize]).collect())
        .collect();
    let table = MergedPointTable::concat(&chunks, relabeled);
    timings.record(Phase::Assemble, lap.lap());

    let instances = summarize(&table, config.centroid_decimals);
    timings.record(Phase::Summarize, lap.lap());
    timings.report(&group.group_id, table.len());

    tracing::info!(
        group = %group.group_id,
        chunks = chunks.len(),
        skipped = warnings.len(),
        points = table.len(),
        assigned = offsets.max_label(),
        merged,
        instances = instances.len(),
        "group merged"
    );

    Ok(GroupOutput {
        group_id: group.group_id.clone(),
        table,
        instances,
        chunks: chunk_reports,
        offsets,
        label_maps,
        unions: matching.requests.clone(),
        matching: MatchOutputStats::from(&matching),
        warnings,
    })
}
