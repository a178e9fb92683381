//! High-resolution timer for frame pacing statistics.

use std::time::{Duration, Instant};

/// High-resolution timer for measuring elapsed time.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Get the total elapsed time since the timer was created or reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get the elapsed time in seconds since the timer was created or reset.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Get the time elapsed since the last call to `tick()`.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }

    /// Average rate of `count` events over the elapsed time, in events per second.
    ///
    /// Returns 0.0 before any measurable time has passed.
    pub fn rate(&self, count: u64) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 { count as f64 / secs } else { 0.0 }
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_measures_since_last_tick() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(5));
        let first = timer.tick();
        assert!(first >= Duration::from_millis(5));

        let second = timer.tick();
        assert!(second < first);
        assert!(timer.elapsed() >= first);
    }

    #[test]
    fn test_rate_is_zero_without_elapsed_time() {
        let timer = Timer::new();
        // Elapsed is never exactly zero on real clocks, but must not be negative or NaN.
        assert!(timer.rate(0) == 0.0);
        assert!(timer.rate(10).is_finite());
    }
}
