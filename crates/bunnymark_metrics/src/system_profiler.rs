//! Accumulated time per named frame phase

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default, Clone, Copy)]
struct PhaseTiming {
    total: Duration,
    calls: u32,
}

pub struct SystemProfiler {
    timings: HashMap<&'static str, PhaseTiming>,
}

impl SystemProfiler {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
        }
    }

    pub fn time_system<F, R>(&mut self, name: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(name, start.elapsed());
        result
    }

    pub fn record(&mut self, name: &'static str, elapsed: Duration) {
        let timing = self.timings.entry(name).or_default();
        timing.total += elapsed;
        timing.calls += 1;
    }

    pub fn get_timing(&self, name: &str) -> Duration {
        self.timings.get(name).map(|t| t.total).unwrap_or(Duration::ZERO)
    }

    /// Mean time per call, zero for a phase never timed.
    pub fn average(&self, name: &str) -> Duration {
        match self.timings.get(name) {
            Some(t) if t.calls > 0 => t.total / t.calls,
            _ => Duration::ZERO,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Duration)> + '_ {
        self.timings.iter().map(|(name, t)| (*name, t.total))
    }
}

impl Default for SystemProfiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_average() {
        let mut profiler = SystemProfiler::new();
        profiler.record("encode", Duration::from_millis(2));
        profiler.record("encode", Duration::from_millis(4));

        assert_eq!(profiler.get_timing("encode"), Duration::from_millis(6));
        assert_eq!(profiler.average("encode"), Duration::from_millis(3));
        assert_eq!(profiler.average("submit"), Duration::ZERO);
    }

    #[test]
    fn test_time_system_passes_result_through() {
        let mut profiler = SystemProfiler::new();
        let value = profiler.time_system("step", || 7);
        assert_eq!(value, 7);
        assert_eq!(profiler.iter().count(), 1);
    }
}
