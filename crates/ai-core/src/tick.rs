/// Timing information for one AI tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    /// Monotonic tick counter, starting at 0.
    pub tick: u64,
    /// Simulated seconds covered by this tick.
    pub dt_seconds: f32,
    /// Simulated seconds since the first tick, including this one.
    pub time_seconds: f64,
}

impl TickContext {
    pub fn new(tick: u64, dt_seconds: f32, time_seconds: f64) -> Self {
        Self {
            tick,
            dt_seconds,
            time_seconds,
        }
    }

    /// Returns the context for the tick following this one.
    pub fn next(&self, dt_seconds: f32) -> Self {
        Self {
            tick: self.tick + 1,
            dt_seconds,
            time_seconds: self.time_seconds + f64::from(dt_seconds),
        }
    }
}

impl Default for TickContext {
    fn default() -> Self {
        Self::new(0, 0.0, 0.0)
    }
}
