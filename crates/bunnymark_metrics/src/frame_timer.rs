//! Rolling frame-time statistics

use super::ring_buffer::RingBuffer;
use std::time::Duration;

/// Keeps the last `capacity` frame durations.
///
/// The benchmark loop already measures frame deltas, so samples are pushed
/// in rather than timed here.
pub struct FrameTimer {
    frame_times: RingBuffer<Duration>,
    frames: u64,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frame_times: RingBuffer::new(capacity),
            frames: 0,
        }
    }

    pub fn record(&mut self, frame_time: Duration) {
        self.frame_times.push(frame_time);
        self.frames += 1;
    }

    pub fn record_millis(&mut self, millis: f32) {
        self.record(Duration::from_secs_f64(f64::from(millis.max(0.0)) / 1000.0));
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn fps(&self) -> f64 {
        let avg = self.frame_times.average();
        if avg.as_secs_f64() > 0.0 {
            1.0 / avg.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn frame_time_ms(&self) -> f64 {
        self.frame_times.average().as_secs_f64() * 1000.0
    }

    pub fn frame_time_range_ms(&self) -> (f64, f64) {
        let (min, max) = self.frame_times.min_max();
        (min.as_secs_f64() * 1000.0, max.as_secs_f64() * 1000.0)
    }
}
