//! Label remapping: give every chunk a disjoint, contiguous range of global ids.
//!
//! Offsets are a cumulative sum of per-chunk distinct non-zero label counts,
//! taken in the group's processing order (ascending chunk id). Global ids
//! start at 1; 0 stays 0.

use serde::Serialize;

use crate::error::MergeError;
use crate::types::{Label, NOISE_LABEL};

/// Distinct non-zero labels of a chunk, ascending.
pub fn distinct_labels(labels: &[Label]) -> Vec<Label> {
    let mut out: Vec<Label> = labels.iter().copied().filter(|&l| l != NOISE_LABEL).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Local-to-global label correspondence of one chunk.
///
/// The `i`-th smallest local label maps to `start + i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    start: Label,
    locals: Vec<Label>,
}

impl LabelMap {
    /// `locals` must be sorted and free of duplicates and of the noise label.
    pub fn new(locals: Vec<Label>, start: Label) -> Self {
        debug_assert!(locals.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(locals.first() != Some(&NOISE_LABEL));
        Self { start, locals }
    }

    #[inline]
    pub fn start(&self) -> Label {
        self.start
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.locals.len()
    }

    pub fn to_global(&self, local: Label) -> Option<Label> {
        if local == NOISE_LABEL {
            return Some(NOISE_LABEL);
        }
        self.locals
            .binary_search(&local)
            .ok()
            .map(|i| self.start + i as Label)
    }

    pub fn to_local(&self, global: Label) -> Option<Label> {
        if global == NOISE_LABEL {
            return Some(NOISE_LABEL);
        }
        let i = global.checked_sub(self.start)? as usize;
        self.locals.get(i).copied()
    }

    /// `(local, global)` pairs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (Label, Label)> + '_ {
        self.locals
            .iter()
            .enumerate()
            .map(move |(i, &l)| (l, self.start + i as Label))
    }

    /// Map a whole label column. Every label must come from the chunk this map was built for.
    pub fn apply(&self, labels: &[Label]) -> Vec<Label> {
        labels
            .iter()
            .map(|&l| {
                let g = self.to_global(l);
                debug_assert!(g.is_some(), "label {l} not in map");
                g.unwrap_or(NOISE_LABEL)
            })
            .collect()
    }
}

/// One entry of the offset table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelOffset {
    pub chunk_id: String,
    pub start: Label,
    pub count: usize,
}

/// Chunk id to `(start_global_id, count)` in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelOffsetTable {
    entries: Vec<LabelOffset>,
    max_label: Label,
}

impl LabelOffsetTable {
    /// Cumulative-sum `(chunk_id, distinct_label_count)` pairs, in the order given.
    ///
    /// Fails with [`MergeError::LabelOverflow`] at the first chunk whose
    /// range would end above `limit`.
    pub fn build<'a, I>(counts: I, limit: Label) -> Result<Self, MergeError>
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        let mut entries = Vec::new();
        let mut used: u64 = 0;
        for (chunk_id, count) in counts {
            let required = used + count as u64;
            if required > limit as u64 {
                return Err(MergeError::LabelOverflow {
                    chunk: chunk_id.to_owned(),
                    required,
                    limit,
                });
            }
            // Chunks without labels keep the next free id as a nominal start.
            let start = Label::try_from(used + 1).unwrap_or(Label::MAX);
            entries.push(LabelOffset {
                chunk_id: chunk_id.to_owned(),
                start,
                count,
            });
            used = required;
        }
        Ok(Self {
            entries,
            max_label: used as Label,
        })
    }

    pub fn entries(&self) -> &[LabelOffset] {
        &self.entries
    }

    pub fn get(&self, chunk_id: &str) -> Option<&LabelOffset> {
        self.entries.iter().find(|e| e.chunk_id == chunk_id)
    }

    /// Highest global id handed out (0 if none).
    #[inline]
    pub fn max_label(&self) -> Label {
        self.max_label
    }
}

/// Map a chunk's distinct labels onto `[start, start + count)`.
pub fn remap_chunk(labels: &[Label], start: Label) -> LabelMap {
    LabelMap::new(distinct_labels(labels), start)
}
