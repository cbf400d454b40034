use std::time::Instant;

/// Monotonic period source for the estimator's `dt`.
#[derive(Debug, Clone, Default)]
pub struct PeriodClock {
    last: Option<Instant>,
}

impl PeriodClock {
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Seconds since the previous tick; `None` on the first tick.
    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    /// As [`tick`](Self::tick), with an explicit timestamp.
    pub fn tick_at(&mut self, now: Instant) -> Option<f64> {
        let elapsed = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f64());
        self.last = Some(now);
        elapsed
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
