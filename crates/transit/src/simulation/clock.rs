//! Simulated time of day for playback.

use crate::models::time::{format_gtfs_time, wrap_day};

/// One real second of playback at speed 1 covers one simulated minute
pub const SIMULATED_SECONDS_PER_REAL_SECOND: f64 = 60.0;

/// 08:00:00
pub const DEFAULT_START_TIME: f64 = 8.0 * 3600.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationClock {
    time: f64,
    playing: bool,
    speed: f64,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self {
            time: DEFAULT_START_TIME,
            playing: false,
            speed: 1.0,
        }
    }
}

impl SimulationClock {
    pub fn new(time: f64) -> Self {
        let mut clock = Self::default();
        clock.set_time(time);
        clock
    }

    /// Seconds since midnight, always in `[0, 86400)`
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = wrap_day(time);
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn toggle(&mut self) {
        self.playing = !self.playing;
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Negative or non-finite speeds are ignored
    pub fn set_speed(&mut self, speed: f64) {
        if speed.is_finite() && speed >= 0.0 {
            self.speed = speed;
        }
    }

    /// Move forward by `real_seconds` of wall time. Does nothing while paused.
    pub fn advance(&mut self, real_seconds: f64) {
        if self.playing {
            self.set_time(self.time + real_seconds * SIMULATED_SECONDS_PER_REAL_SECOND * self.speed);
        }
    }

    /// `HH:MM:SS`
    pub fn label(&self) -> String {
        format_gtfs_time(self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_defaults() {
        let clock = SimulationClock::default();
        assert_eq!(clock.time(), 28_800.0);
        assert_eq!(clock.label(), "08:00:00");
        assert!(!clock.is_playing());
        assert_eq!(clock.speed(), 1.0);
    }

    #[test]
    fn test_advance() {
        let mut clock = SimulationClock::default();
        clock.advance(10.0);
        assert_eq!(clock.time(), 28_800.0);

        clock.play();
        clock.set_speed(2.0);
        clock.advance(0.5);
        assert_abs_diff_eq!(clock.time(), 28_860.0, epsilon = 1e-9);

        clock.set_speed(-3.0);
        assert_eq!(clock.speed(), 2.0);
    }

    #[test]
    fn test_wraps_at_midnight() {
        let mut clock = SimulationClock::new(86_390.0);
        clock.play();
        clock.advance(1.0);
        assert_abs_diff_eq!(clock.time(), 50.0, epsilon = 1e-9);

        clock.set_time(-60.0);
        assert_abs_diff_eq!(clock.time(), 86_340.0, epsilon = 1e-9);
    }
}
