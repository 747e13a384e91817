//! Keystroke interval capture
//!
//! Tracks inter-keystroke intervals within a continuous typing session.
//! Intervals longer than the pause ceiling are treated as field switches and
//! dropped, so a user pausing to think never reads as slow typing.

use std::collections::VecDeque;

use crate::config::{TypingConfig, DEFAULT_MAX_TYPING_SAMPLES};
use crate::error::TrustError;
use crate::types::{TypingPattern, TypingRhythm};

/// Bounded window of recent keystroke intervals
#[derive(Debug, Clone)]
pub struct TypingWindow {
    intervals: VecDeque<u64>,
    last_keystroke_ms: Option<u64>,
    text_len: usize,
    pause_ceiling_ms: u64,
    max_samples: usize,
    min_pattern_samples: usize,
}

impl Default for TypingWindow {
    fn default() -> Self {
        Self::new(&TypingConfig::default())
    }
}

impl TypingWindow {
    pub fn new(config: &TypingConfig) -> Self {
        Self {
            intervals: VecDeque::with_capacity(config.max_samples.min(DEFAULT_MAX_TYPING_SAMPLES)),
            last_keystroke_ms: None,
            text_len: 0,
            pause_ceiling_ms: config.pause_ceiling_ms,
            max_samples: config.max_samples.max(1),
            min_pattern_samples: config.min_pattern_samples,
        }
    }

    /// Record a character appended at `now_ms`.
    ///
    /// Returns the current pattern once enough intervals have been admitted.
    pub fn record_keystroke(&mut self, now_ms: u64) -> Result<Option<TypingPattern>, TrustError> {
        let Some(previous_ms) = self.last_keystroke_ms else {
            self.last_keystroke_ms = Some(now_ms);
            return Ok(None);
        };

        if now_ms < previous_ms {
            return Err(TrustError::NegativeInterval {
                previous_ms,
                now_ms,
            });
        }

        let interval = now_ms - previous_ms;
        if interval <= self.pause_ceiling_ms {
            self.intervals.push_back(interval);
            while self.intervals.len() > self.max_samples {
                self.intervals.pop_front();
            }
            log::trace!("admitted keystroke interval {}ms", interval);
        } else {
            log::trace!("dropped {}ms pause as field switch", interval);
        }
        self.last_keystroke_ms = Some(now_ms);

        if self.intervals.len() >= self.min_pattern_samples {
            Ok(Some(self.current_pattern()))
        } else {
            Ok(None)
        }
    }

    /// Feed the new length of a monitored text field.
    ///
    /// Growth counts as a keystroke. Shrinking is a deletion, which ends the
    /// continuous typing session so the next keystroke starts a new one.
    pub fn on_text_changed(
        &mut self,
        new_len: usize,
        now_ms: u64,
    ) -> Result<Option<TypingPattern>, TrustError> {
        let result = if new_len > self.text_len {
            self.record_keystroke(now_ms)?
        } else {
            if new_len < self.text_len {
                self.record_deletion();
            }
            None
        };
        self.text_len = new_len;
        Ok(result)
    }

    /// Break the continuous typing session without discarding intervals
    pub fn record_deletion(&mut self) {
        self.last_keystroke_ms = None;
    }

    /// Mean (truncated to whole milliseconds) and population variance over the
    /// retained intervals. The variance is taken around the exact mean.
    pub fn current_pattern(&self) -> TypingPattern {
        if self.intervals.is_empty() {
            return TypingPattern::empty();
        }

        let n = self.intervals.len() as f64;
        let mean = self.intervals.iter().map(|&i| i as f64).sum::<f64>() / n;
        let variance = self
            .intervals
            .iter()
            .map(|&i| (i as f64 - mean).powi(2))
            .sum::<f64>()
            / n;

        let mean_interval_ms = mean.trunc();

        TypingPattern {
            mean_interval_ms,
            variance,
            sample_count: self.intervals.len(),
            rhythm: TypingRhythm::from_mean_interval(mean_interval_ms),
            pressure_samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Retained intervals, oldest first
    pub fn intervals(&self) -> impl Iterator<Item = u64> + '_ {
        self.intervals.iter().copied()
    }

    /// Clear intervals, the last timestamp and the tracked field length
    pub fn reset(&mut self) {
        self.intervals.clear();
        self.last_keystroke_ms = None;
        self.text_len = 0;
    }
}
