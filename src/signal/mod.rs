//! Rolling behavioral signal aggregation
//!
//! `SignalWindow` owns the raw behavioral state of a session: the keystroke
//! interval window and the device stability estimator. It only ever hands
//! derived statistics downstream.
//!
//! Pipeline: raw samples → SignalWindow → TypingPattern / stability → factor scorers

pub mod motion;
pub mod typing;

pub use motion::{MotionOutcome, StabilityTracker, MAX_STABILITY};
pub use typing::TypingWindow;

use crate::config::{EngineConfig, ResetScope};
use crate::error::TrustError;
use crate::types::TypingPattern;

/// Keystroke window plus device stability for one session
#[derive(Debug, Clone, Default)]
pub struct SignalWindow {
    typing: TypingWindow,
    stability: StabilityTracker,
}

impl SignalWindow {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            typing: TypingWindow::new(&config.typing),
            stability: StabilityTracker::new(config.stability.clone()),
        }
    }

    pub fn record_keystroke(&mut self, now_ms: u64) -> Result<Option<TypingPattern>, TrustError> {
        self.typing.record_keystroke(now_ms)
    }

    pub fn on_text_changed(
        &mut self,
        new_len: usize,
        now_ms: u64,
    ) -> Result<Option<TypingPattern>, TrustError> {
        self.typing.on_text_changed(new_len, now_ms)
    }

    pub fn record_deletion(&mut self) {
        self.typing.record_deletion();
    }

    pub fn on_motion_sample(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        now_ms: u64,
    ) -> Result<MotionOutcome, TrustError> {
        self.stability.on_motion_sample(x, y, z, now_ms)
    }

    pub fn current_pattern(&self) -> TypingPattern {
        self.typing.current_pattern()
    }

    /// Current pattern, or `None` while no interval has been admitted
    pub fn pattern_if_any(&self) -> Option<TypingPattern> {
        let pattern = self.typing.current_pattern();
        pattern.has_data().then_some(pattern)
    }

    pub fn stability(&self) -> u8 {
        self.stability.stability()
    }

    pub fn typing(&self) -> &TypingWindow {
        &self.typing
    }

    pub fn motion(&self) -> &StabilityTracker {
        &self.stability
    }

    /// Clear the typing session; stability survives unless `scope` says otherwise
    pub fn reset(&mut self, scope: ResetScope) {
        self.typing.reset();
        if scope == ResetScope::SessionAndDevice {
            self.stability.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shaken_window() -> SignalWindow {
        let mut window = SignalWindow::default();
        window.record_keystroke(0).unwrap();
        window.record_keystroke(150).unwrap();
        window.on_motion_sample(10.0, 10.0, 10.0, 1_000).unwrap();
        window
    }

    #[test]
    fn test_pattern_if_any() {
        let window = SignalWindow::default();
        assert!(window.pattern_if_any().is_none());

        let window = shaken_window();
        let pattern = window.pattern_if_any().unwrap();
        assert_eq!(pattern.sample_count, 1);
    }

    #[test]
    fn test_session_reset_keeps_stability() {
        let mut window = shaken_window();
        assert_eq!(window.stability(), 95);

        window.reset(ResetScope::Session);
        assert!(window.typing().is_empty());
        assert_eq!(window.stability(), 95);
    }

    #[test]
    fn test_device_reset_restores_stability() {
        let mut window = shaken_window();
        window.reset(ResetScope::SessionAndDevice);
        assert!(window.typing().is_empty());
        assert_eq!(window.stability(), MAX_STABILITY);
        assert_eq!(window.motion().shake_count(), 0);
    }
}
