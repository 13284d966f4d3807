//! Merge configuration.

use serde::{Deserialize, Serialize};

use crate::error::MergeError;
use crate::matcher::{MatchParams, MatchStrategy};
use crate::types::Label;

/// Configuration for merging chunk groups.
///
/// Deserialises with defaults for any missing field, so a host application
/// can load a partial JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Border width: points within this distance of the chunk's x/y bounds are border points.
    pub epsilon: f64,
    /// Border points of different chunks closer than this (3D, strict) are the same tree.
    pub threshold_distance: f64,
    /// Name of the instance label column in the input tables.
    pub label_column: String,
    /// Worker threads. `None` uses the global rayon pool (all cores).
    pub workers: Option<usize>,
    pub strategy: MatchStrategy,
    /// Upper bound on point-pair comparisons per group. `None` is uncapped.
    pub max_comparisons: Option<u64>,
    /// Highest global instance id a group may use.
    pub max_global_label: Label,
    /// Decimals kept in reported centroids.
    pub centroid_decimals: u32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.05,
            threshold_distance: 0.02,
            label_column: "preds".to_owned(),
            workers: None,
            strategy: MatchStrategy::Grid,
            max_comparisons: None,
            max_global_label: Label::MAX,
            centroid_decimals: 3,
        }
    }
}

impl MergeConfig {
    pub fn validate(&self) -> Result<(), MergeError> {
        if !(self.epsilon >= 0.0) || !self.epsilon.is_finite() {
            return Err(MergeError::InvalidConfig(format!(
                "epsilon must be a finite non-negative distance, got {}",
                self.epsilon
            )));
        }
        if !(self.threshold_distance >= 0.0) || !self.threshold_distance.is_finite() {
            return Err(MergeError::InvalidConfig(format!(
                "threshold_distance must be a finite non-negative distance, got {}",
                self.threshold_distance
            )));
        }
        if self.label_column.is_empty() {
            return Err(MergeError::InvalidConfig("label_column is empty".into()));
        }
        if self.workers == Some(0) {
            return Err(MergeError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.centroid_decimals > 15 {
            return Err(MergeError::InvalidConfig(format!(
                "centroid_decimals must be at most 15, got {}",
                self.centroid_decimals
            )));
        }
        Ok(())
    }

    pub(crate) fn match_params(&self) -> MatchParams {
        MatchParams {
            threshold_distance: self.threshold_distance,
            strategy: self.strategy,
            max_comparisons: self.max_comparisons,
        }
    }
}
