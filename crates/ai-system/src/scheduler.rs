use ai_core::TickContext;

/// Accumulates frame time and dispatches an AI tick once a full interval has passed.
#[derive(Debug, Clone, PartialEq)]
pub struct TickScheduler {
    interval: f32,
    accumulated: f32,
    last: TickContext,
}

impl TickScheduler {
    /// A non-positive interval dispatches on every call to [`TickScheduler::advance`].
    pub fn new(interval_seconds: f32) -> Self {
        Self {
            interval: interval_seconds.max(0.0),
            accumulated: 0.0,
            last: TickContext::default(),
        }
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }

    pub fn set_interval(&mut self, interval_seconds: f32) {
        self.interval = interval_seconds.max(0.0);
    }

    /// Time accumulated towards the next dispatch.
    pub fn accumulated(&self) -> f32 {
        self.accumulated
    }

    /// Context of the most recent dispatch (tick 0 before the first one).
    pub fn last(&self) -> TickContext {
        self.last
    }

    /// Adds `dt` and returns the tick to run, if one is due. The tick covers all accumulated
    /// time, after which the accumulator restarts from zero.
    pub fn advance(&mut self, dt_seconds: f32) -> Option<TickContext> {
        self.accumulated += dt_seconds.max(0.0);
        if self.accumulated < self.interval {
            return None;
        }
        self.last = self.last.next(self.accumulated);
        self.accumulated = 0.0;
        Some(self.last)
    }

    pub fn reset(&mut self) {
        self.accumulated = 0.0;
        self.last = TickContext::default();
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TICK_RATE_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_accumulated_time_once_the_interval_elapses() {
        let mut scheduler = TickScheduler::new(0.5);

        assert_eq!(scheduler.advance(0.2), None);
        assert_eq!(scheduler.advance(0.2), None);
        let tick = scheduler.advance(0.2).unwrap();

        assert_eq!(tick.tick, 1);
        assert!((tick.dt_seconds - 0.6).abs() < 1e-6);
        assert_eq!(scheduler.accumulated(), 0.0);
        assert_eq!(scheduler.last(), tick);
    }

    #[test]
    fn zero_interval_ticks_every_frame() {
        let mut scheduler = TickScheduler::new(0.0);
        assert_eq!(scheduler.advance(0.016).map(|t| t.tick), Some(1));
        assert_eq!(scheduler.advance(0.016).map(|t| t.tick), Some(2));
    }
}
