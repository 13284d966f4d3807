//! Error and warning types for chunk merging.

use serde::Serialize;
use thiserror::Error;

/// Errors that abort the merge of one chunk group.
///
/// Other groups are unaffected; `merge_groups` reports each group's result separately.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    /// A chunk lacks a required column (`x`, `y`, `z` or the label column),
    /// has ragged columns, or carries a label cell that is not a valid
    /// non-negative integer.
    #[error("input schema error in chunk {chunk:?}: {reason}")]
    InputSchema { chunk: String, reason: String },

    /// The group needs more global instance ids than the configured limit allows.
    #[error(
        "label overflow at chunk {chunk:?}: {required} global ids required, limit is {limit}"
    )]
    LabelOverflow {
        chunk: String,
        required: u64,
        limit: u32,
    },

    /// Planned border comparisons exceed `MergeConfig::max_comparisons`.
    #[error("comparison budget exceeded: {planned} planned comparisons, budget is {budget}")]
    ComparisonBudgetExceeded { planned: u64, budget: u64 },

    /// The configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The dedicated worker pool could not be created.
    #[error("worker pool: {0}")]
    WorkerPool(String),

    /// The group was not started because the caller requested cancellation.
    #[error("cancelled before the group was started")]
    Cancelled,
}

/// Non-fatal conditions surfaced alongside a successful merge.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeWarning {
    /// A chunk with zero points was excluded from the group.
    #[error("chunk {chunk:?} has no points and was skipped")]
    EmptyChunk { chunk: String },
}

impl MergeError {
    pub(crate) fn schema(chunk: &str, reason: impl Into<String>) -> Self {
        MergeError::InputSchema {
            chunk: chunk.to_owned(),
            reason: reason.into(),
        }
    }
}
