use super::Phase;
use std::time::{Duration, Instant};

/// Timer for sequential phases: each `lap()` uses a single `Instant::now()`.
pub struct LapTimer(Instant);

impl LapTimer {
    #[inline]
    pub fn start() -> Self {
        Self(Instant::now())
    }

    #[inline]
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let d = now.duration_since(self.0);
        self.0 = now;
        d
    }
}

/// Phase durations of one group merge.
#[derive(Debug, Clone, Default)]
pub struct MergeTimings {
    pub load: Duration,
    pub prepare: Duration,
    pub matching: Duration,
    pub unify: Duration,
    pub assemble: Duration,
    pub summarize: Duration,
}

impl MergeTimings {
    #[inline]
    pub fn record(&mut self, phase: Phase, d: Duration) {
        let slot = match phase {
            Phase::Load => &mut self.load,
            Phase::Prepare => &mut self.prepare,
            Phase::Match => &mut self.matching,
            Phase::Unify => &mut self.unify,
            Phase::Assemble => &mut self.assemble,
            Phase::Summarize => &mut self.summarize,
        };
        *slot += d;
    }

    pub fn total(&self) -> Duration {
        self.load + self.prepare + self.matching + self.unify + self.assemble + self.summarize
    }

    pub fn report(&self, group_id: &str, points: usize) {
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        tracing::info!(
            group = group_id,
            points,
            total_ms = ms(self.total()),
            load_ms = ms(self.load),
            prepare_ms = ms(self.prepare),
            match_ms = ms(self.matching),
            unify_ms = ms(self.unify),
            assemble_ms = ms(self.assemble),
            summarize_ms = ms(self.summarize),
            "merge timings"
        );
    }
}
