//! Zero-cost phase timing for the merge driver.
//!
//! When the `timing` feature is enabled, phase durations are collected per
//! group and reported through `tracing`. When disabled, all types become
//! zero-sized and all methods compile away.

/// Merge phase being timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Schema validation and conversion of input tables.
    Load,
    /// Border detection and label remapping (per chunk).
    Prepare,
    /// Cross-chunk border matching.
    Match,
    /// Union-find resolution.
    Unify,
    /// Relabelling and concatenation.
    Assemble,
    /// Instance summaries.
    Summarize,
}

#[cfg(feature = "timing")]
mod real;
#[cfg(not(feature = "timing"))]
mod stub;

#[cfg(feature = "timing")]
pub use real::*;
#[cfg(not(feature = "timing"))]
pub use stub::*;
