//! Frame timing
//!
//! Wall-clock delta between frames plus a once-per-second frame counter

use std::time::{Duration, Instant};

/// Length of one FPS sampling window.
pub const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Measures frame deltas and counts frames per wall-clock second.
pub struct FrameClock {
    last_tick: Option<Instant>,
    window_start: Instant,
    frames_in_window: u32,
    tick_count: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Clock whose first FPS window opens at `now`.
    pub fn starting_at(now: Instant) -> Self {
        Self {
            last_tick: None,
            window_start: now,
            frames_in_window: 0,
            tick_count: 0,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Milliseconds since the previous tick. The first tick returns `0.0`.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let dt_millis = match self.last_tick {
            Some(previous) => millis(now.saturating_duration_since(previous)),
            None => 0.0,
        };

        self.last_tick = Some(now);
        self.frames_in_window += 1;
        self.tick_count += 1;
        dt_millis
    }

    /// Frames counted in the window that just closed, if a full second has
    /// passed since the window opened. Closing a window resets the count.
    pub fn sample_fps(&mut self) -> Option<u32> {
        self.sample_fps_at(Instant::now())
    }

    pub fn sample_fps_at(&mut self, now: Instant) -> Option<u32> {
        if now.saturating_duration_since(self.window_start) < FPS_WINDOW {
            return None;
        }

        let frames = self.frames_in_window;
        self.frames_in_window = 0;
        self.window_start = now;
        Some(frames)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

fn millis(duration: Duration) -> f32 {
    (duration.as_nanos() as f64 / 1_000_000.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_is_zero() {
        let t0 = Instant::now();
        let mut clock = FrameClock::starting_at(t0);

        assert_eq!(clock.tick_at(t0 + Duration::from_millis(5)), 0.0);
        assert_eq!(clock.tick_at(t0 + Duration::from_millis(21)), 16.0);
        assert_eq!(clock.tick_count(), 2);
    }

    #[test]
    fn sub_millisecond_deltas() {
        let t0 = Instant::now();
        let mut clock = FrameClock::starting_at(t0);

        clock.tick_at(t0);
        let dt = clock.tick_at(t0 + Duration::from_micros(250));
        assert!((dt - 0.25).abs() < 1e-6);
    }

    #[test]
    fn no_sample_inside_the_window() {
        let t0 = Instant::now();
        let mut clock = FrameClock::starting_at(t0);

        assert_eq!(clock.sample_fps_at(t0 + Duration::from_millis(999)), None);
    }

    #[test]
    fn samples_frame_count_after_a_second() {
        let t0 = Instant::now();
        let mut clock = FrameClock::starting_at(t0);

        for i in 0..=60u64 {
            clock.tick_at(t0 + Duration::from_micros(i * 16_666));
            assert_eq!(clock.sample_fps_at(t0 + Duration::from_micros(i * 16_666)), None);
        }

        // 61 ticks landed inside the first second
        assert_eq!(clock.sample_fps_at(t0 + Duration::from_secs(1)), Some(61));
    }

    #[test]
    fn sampling_resets_the_window() {
        let t0 = Instant::now();
        let mut clock = FrameClock::starting_at(t0);

        clock.tick_at(t0);
        clock.tick_at(t0 + Duration::from_millis(500));
        assert_eq!(clock.sample_fps_at(t0 + Duration::from_secs(1)), Some(2));

        // New window opened at t0 + 1s
        clock.tick_at(t0 + Duration::from_millis(1_200));
        assert_eq!(clock.sample_fps_at(t0 + Duration::from_millis(1_900)), None);
        assert_eq!(clock.sample_fps_at(t0 + Duration::from_secs(2)), Some(1));
    }
}
