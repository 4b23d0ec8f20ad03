//! Frame timing.

use std::time::{Duration, Instant};

/// Measures the time between consecutive frames.
///
/// Deltas are clamped so that a long stall (debugger break, window drag)
/// does not hand a huge step to the update logic.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    max_delta: Duration,
    frame: u64,
}

impl FrameClock {
    pub const DEFAULT_MAX_DELTA: Duration = Duration::from_millis(250);

    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            max_delta: Self::DEFAULT_MAX_DELTA,
            frame: 0,
        }
    }

    pub fn with_max_delta(mut self, max_delta: Duration) -> Self {
        self.max_delta = max_delta;
        self
    }

    /// Seconds since the previous tick, clamped to the maximum delta.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last).min(self.max_delta);
        self.last = now;
        self.frame += 1;
        delta.as_secs_f32()
    }

    /// Ticks so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn elapsed(&self) -> Duration {
        self.last.saturating_duration_since(self.start)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_stalls_are_clamped() {
        let mut clock = FrameClock::new().with_max_delta(Duration::from_millis(100));
        let start = clock.last;
        let dt = clock.tick_at(start + Duration::from_secs(3));
        assert!((dt - 0.1).abs() < 1e-6);
        let dt = clock.tick_at(start + Duration::from_millis(3050));
        assert!((dt - 0.05).abs() < 1e-6);
        assert_eq!(clock.frame(), 2);
    }
}
