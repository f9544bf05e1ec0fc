//! Timing primitives for playback transport.
//!
//! The [`TransportClock`] converts between wall-clock instants and elapsed
//! playback seconds. It maintains an anchor point (elapsed seconds at a
//! specific [`Instant`]) so that pause and resume preserve the cumulative
//! position exactly, and so that elapsed time can be computed for synthetic
//! instants in tests without sleeping.

use std::time::Instant;

/// Monotonic playback clock with pause support.
///
/// The clock is pure arithmetic over [`Instant`]s: all mutating operations
/// take `now` explicitly, which keeps the scheduler deterministic under test.
#[derive(Clone, Debug)]
pub struct TransportClock {
    running: bool,
    anchor_instant: Instant,
    anchor_elapsed: f64,
}

impl Default for TransportClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportClock {
    /// Create a stopped clock at position 0.
    pub fn new() -> Self {
        Self {
            running: false,
            anchor_instant: Instant::now(),
            anchor_elapsed: 0.0,
        }
    }

    /// Start the clock from position 0 at the given instant.
    pub fn start(&mut self, now: Instant) {
        self.anchor_instant = now;
        self.anchor_elapsed = 0.0;
        self.running = true;
    }

    /// Freeze the clock, preserving the current position.
    pub fn pause(&mut self, now: Instant) {
        self.anchor_elapsed = self.elapsed_at(now);
        self.running = false;
    }

    /// Resume a paused clock at the given instant.
    pub fn resume(&mut self, now: Instant) {
        self.anchor_instant = now;
        self.running = true;
    }

    /// Stop the clock and reset the position to 0.
    pub fn stop(&mut self) {
        self.anchor_elapsed = 0.0;
        self.running = false;
    }

    /// Elapsed playback seconds at the given instant.
    pub fn elapsed_at(&self, now: Instant) -> f64 {
        if !self.running || now <= self.anchor_instant {
            return self.anchor_elapsed;
        }
        self.anchor_elapsed + now.duration_since(self.anchor_instant).as_secs_f64()
    }

    /// Whether the clock is currently advancing.
    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_stopped_clock_reads_zero() {
        let clock = TransportClock::new();
        assert_eq!(clock.elapsed_at(Instant::now()), 0.0);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_elapsed_advances_while_running() {
        let mut clock = TransportClock::new();
        let now = Instant::now();
        clock.start(now);

        let later = now + Duration::from_millis(600);
        assert!((clock.elapsed_at(later) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_pause_preserves_position() {
        let mut clock = TransportClock::new();
        let now = Instant::now();
        clock.start(now);

        let pause_at = now + Duration::from_millis(500);
        clock.pause(pause_at);
        assert!(!clock.is_running());

        // Position is frozen while paused.
        let much_later = pause_at + Duration::from_secs(10);
        assert!((clock.elapsed_at(much_later) - 0.5).abs() < 1e-9);

        // Resume continues from the frozen position.
        clock.resume(much_later);
        let later_still = much_later + Duration::from_millis(250);
        assert!((clock.elapsed_at(later_still) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_stop_resets_position() {
        let mut clock = TransportClock::new();
        let now = Instant::now();
        clock.start(now);
        clock.stop();
        assert_eq!(clock.elapsed_at(now + Duration::from_secs(1)), 0.0);
    }

    #[test]
    fn test_instant_before_anchor_reads_anchor() {
        let mut clock = TransportClock::new();
        let now = Instant::now();
        clock.start(now + Duration::from_secs(1));
        assert_eq!(clock.elapsed_at(now), 0.0);
    }
}
