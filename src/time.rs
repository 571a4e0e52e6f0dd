//! Frame timing.
//!
//! [`FrameClock`] drives the cube spin and the FPS readout in the panel.
//!
//! ```ignore
//! let mut clock = FrameClock::new();
//! loop {
//!     let (elapsed, _delta) = clock.tick();
//!     let model = spin_matrix(elapsed, rate);
//! }
//! ```

use std::time::{Duration, Instant};

/// Tracks elapsed time, frame delta and a smoothed frame rate.
#[derive(Clone, Debug)]
pub struct FrameClock {
    start: Instant,
    last_frame: Instant,
    elapsed_secs: f32,
    delta_secs: f32,
    frame_count: u64,
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
}

impl FrameClock {
    /// Start a clock at the current instant.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
        }
    }

    /// Advance to the current instant. Call once per rendered frame.
    ///
    /// Returns `(elapsed, delta)` in seconds.
    pub fn tick(&mut self) -> (f32, f32) {
        self.tick_at(Instant::now())
    }

    /// Advance to `now`. Instants earlier than the last tick count as no time.
    pub fn tick_at(&mut self, now: Instant) -> (f32, f32) {
        self.delta_secs = now.saturating_duration_since(self.last_frame).as_secs_f32();
        self.last_frame = self.last_frame.max(now);
        self.elapsed_secs = self.last_frame.duration_since(self.start).as_secs_f32();
        self.frame_count += 1;

        let fps_elapsed = self.last_frame.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = self.last_frame;
        }

        (self.elapsed_secs, self.delta_secs)
    }

    /// Seconds since the clock started, as of the last tick.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    /// Seconds between the last two ticks.
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Ticks since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second, refreshed twice a second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Instant the clock started.
    #[inline]
    pub fn start_instant(&self) -> Instant {
        self.start
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
    fn test_clock_new() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.elapsed(), 0.0);
        assert_eq!(clock.fps(), 0.0);
    }

    #[test]
    fn test_tick_at() {
        let mut clock = FrameClock::new();
        let start = clock.start_instant();

        let (elapsed, delta) = clock.tick_at(start + Duration::from_millis(100));
        assert!((elapsed - 0.1).abs() < 1e-4);
        assert!((delta - 0.1).abs() < 1e-4);

        let (elapsed, delta) = clock.tick_at(start + Duration::from_millis(150));
        assert!((elapsed - 0.15).abs() < 1e-4);
        assert!((delta - 0.05).abs() < 1e-4);
        assert_eq!(clock.frame(), 2);
    }

    #[test]
    fn test_backwards_instant_is_zero_delta() {
        let mut clock = FrameClock::new();
        let start = clock.start_instant();
        clock.tick_at(start + Duration::from_millis(200));
        let (elapsed, delta) = clock.tick_at(start + Duration::from_millis(100));
        assert_eq!(delta, 0.0);
        assert!((elapsed - 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_fps() {
        let mut clock = FrameClock::new();
        let start = clock.start_instant();
        for i in 1..=60 {
            clock.tick_at(start + Duration::from_micros(i * 16_667));
        }
        assert!((clock.fps() - 60.0).abs() < 1.0, "fps = {}", clock.fps());
    }
}
