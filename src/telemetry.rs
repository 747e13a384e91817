//! Evaluation latency telemetry

use std::collections::VecDeque;
use std::time::Duration;

use crate::config::DEFAULT_LATENCY_WINDOW;
use crate::types::PerformanceStats;

/// Ring buffer of recent evaluation latencies
#[derive(Debug, Clone)]
pub struct LatencyTracker {
    samples_us: VecDeque<u64>,
    window_size: usize,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}

impl LatencyTracker {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            samples_us: VecDeque::with_capacity(window_size.min(DEFAULT_LATENCY_WINDOW)),
            window_size,
        }
    }

    /// Record one latency sample, evicting the oldest when full. Returns microseconds.
    pub fn record(&mut self, elapsed: Duration) -> u64 {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.samples_us.push_back(micros);
        while self.samples_us.len() > self.window_size {
            self.samples_us.pop_front();
        }
        micros
    }

    pub fn last_us(&self) -> Option<u64> {
        self.samples_us.back().copied()
    }

    pub fn average_us(&self) -> Option<f64> {
        if self.samples_us.is_empty() {
            return None;
        }
        let sum: u64 = self.samples_us.iter().sum();
        Some(sum as f64 / self.samples_us.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples_us.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples_us.is_empty()
    }

    pub fn stats(&self) -> PerformanceStats {
        PerformanceStats {
            last_latency_us: self.last_us().unwrap_or(0),
            average_latency_us: self.average_us().unwrap_or(0.0),
            sample_count: self.samples_us.len(),
        }
    }

    pub fn clear(&mut self) {
        self.samples_us.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tracker() {
        let tracker = LatencyTracker::default();
        assert!(tracker.average_us().is_none());
        let stats = tracker.stats();
        assert_eq!(stats.sample_count, 0);
        assert_eq!(stats.last_latency_us, 0);
    }

    #[test]
    fn test_rolling_average_evicts_oldest() {
        let mut tracker = LatencyTracker::new(3);
        for micros in [10, 20, 30, 40] {
            tracker.record(Duration::from_micros(micros));
        }

        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.last_us(), Some(40));
        assert!((tracker.average_us().unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_huge_window_does_not_preallocate() {
        let mut tracker = LatencyTracker::new(usize::MAX);
        tracker.record(Duration::from_micros(7));
        assert_eq!(tracker.last_us(), Some(7));
    }

    #[test]
    fn test_default_window_holds_one_hundred() {
        let mut tracker = LatencyTracker::default();
        for i in 0..150 {
            tracker.record(Duration::from_micros(i));
        }
        assert_eq!(tracker.stats().sample_count, 100);
    }
}
