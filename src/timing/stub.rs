use super::Phase;
use std::time::Duration;

/// Dummy lap timer when `timing` is disabled (zero-sized).
pub struct LapTimer;

impl LapTimer {
    #[inline(always)]
    pub fn start() -> Self {
        Self
    }

    #[inline(always)]
    pub fn lap(&mut self) -> Duration {
        Duration::ZERO
    }
}

/// Dummy phase totals when `timing` is disabled (zero-sized).
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeTimings;

impl MergeTimings {
    #[inline(always)]
    pub fn record(&mut self, _phase: Phase, _d: Duration) {}

    #[inline(always)]
    pub fn report(&self, _group_id: &str, _points: usize) {}
}
