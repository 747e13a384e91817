//! Per-session state and orchestration
//!
//! `TrustSession` bundles everything a single authenticated session mutates:
//! the signal window, the engine (baseline and latency buffer), simulation
//! flags and login state. A host serving several sessions wraps each one in
//! its own lock via [`TrustSession::into_shared`].

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::{EvaluationInput, TrustEngine};
use crate::error::TrustError;
use crate::injection::detect_sql_injection;
use crate::policy::AccessPolicy;
use crate::signal::{MotionOutcome, SignalWindow};
use crate::simulation::{SimulatedAttack, SimulationFlags};
use crate::types::{
    DeviceIntegrity, LocationFix, PerformanceStats, SecurityAction, TrustScore, TypingBaseline,
    TypingPattern,
};

/// Outcome of a correct credential check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginOutcome {
    /// Failure count cleared; the session proceeds normally
    Accepted,
    /// Too many prior failures: the failure count is kept and a second factor is required
    StepUpRequired,
}

/// A session guarded by a single mutual-exclusion boundary
pub type SharedTrustSession = Arc<Mutex<TrustSession>>;

/// Lock a shared session, surfacing a poisoned lock as an error
pub fn lock_session(shared: &SharedTrustSession) -> Result<MutexGuard<'_, TrustSession>, TrustError> {
    shared.lock().map_err(|_| TrustError::SessionLocked)
}

/// Stateful trust evaluation for one user session
#[derive(Debug)]
pub struct TrustSession {
    id: Uuid,
    window: SignalWindow,
    engine: TrustEngine,
    simulation: SimulationFlags,
    device: DeviceIntegrity,
    location: Option<LocationFix>,
    login_failures: u32,
    injection_detected: bool,
    last_score: Option<TrustScore>,
}

impl Default for TrustSession {
    fn default() -> Self {
        Self::from_engine(TrustEngine::default())
    }
}

impl TrustSession {
    pub fn new(config: EngineConfig) -> Result<Self, TrustError> {
        Ok(Self::from_engine(TrustEngine::new(config)?))
    }

    fn from_engine(engine: TrustEngine) -> Self {
        Self {
            id: Uuid::new_v4(),
            window: SignalWindow::new(engine.config()),
            engine,
            simulation: SimulationFlags::default(),
            device: DeviceIntegrity::default(),
            location: None,
            login_failures: 0,
            injection_detected: false,
            last_score: None,
        }
    }

    pub fn into_shared(self) -> SharedTrustSession {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    // ------------------------------------------------------------------
    // Signal capture
    // ------------------------------------------------------------------

    /// Record a character typed at `now_ms`; yields the pattern once enough intervals exist
    pub fn record_keystroke(&mut self, now_ms: u64) -> Result<Option<TypingPattern>, TrustError> {
        self.window.record_keystroke(now_ms)
    }

    /// Feed a monitored field's new length; growth is a keystroke, shrink a deletion
    pub fn on_text_changed(
        &mut self,
        new_len: usize,
        now_ms: u64,
    ) -> Result<Option<TypingPattern>, TrustError> {
        self.window.on_text_changed(new_len, now_ms)
    }

    pub fn record_deletion(&mut self) {
        self.window.record_deletion();
    }

    pub fn record_motion_sample(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        now_ms: u64,
    ) -> Result<MotionOutcome, TrustError> {
        self.window.on_motion_sample(x, y, z, now_ms)
    }

    pub fn set_location(&mut self, location: Option<LocationFix>) -> Result<(), TrustError> {
        if let Some(fix) = &location {
            fix.validate()?;
        }
        self.location = location;
        Ok(())
    }

    pub fn location(&self) -> Option<&LocationFix> {
        self.location.as_ref()
    }

    pub fn set_device_integrity(&mut self, device: DeviceIntegrity) {
        self.device = device;
    }

    // ------------------------------------------------------------------
    // Login state
    // ------------------------------------------------------------------

    pub fn record_login_failure(&mut self) -> u32 {
        self.login_failures = self.login_failures.saturating_add(1);
        self.login_failures
    }

    /// Record a correct credential check.
    ///
    /// Below the failure threshold the count is cleared. At or above it the
    /// count (and with it the score cap) stays until a full reset.
    pub fn record_login_success(&mut self) -> LoginOutcome {
        let threshold = self.engine.config().overrides.login_failure_threshold;
        if self.login_failures >= threshold {
            log::warn!(
                "session {}: correct credentials after {} failures, step-up required",
                self.id,
                self.login_failures
            );
            return LoginOutcome::StepUpRequired;
        }
        self.login_failures = 0;
        LoginOutcome::Accepted
    }

    pub fn login_failures(&self) -> u32 {
        self.login_failures
    }

    /// Latch an injection verdict produced by the host
    pub fn flag_injection(&mut self) {
        log::warn!("session {}: injection attempt flagged", self.id);
        self.injection_detected = true;
    }

    /// Screen credential input; a hit latches the injection flag. Returns the verdict.
    pub fn screen_credentials(&mut self, input: &str) -> bool {
        let detected = detect_sql_injection(input);
        if detected {
            self.flag_injection();
        }
        detected
    }

    pub fn injection_detected(&self) -> bool {
        self.injection_detected
    }

    // ------------------------------------------------------------------
    // Baseline
    // ------------------------------------------------------------------

    pub fn set_baseline(&mut self, baseline: TypingBaseline) {
        self.engine.set_baseline(baseline);
    }

    /// Promote the live typing pattern to the baseline. Returns false if no intervals exist.
    pub fn establish_baseline_from_window(&mut self) -> bool {
        match self.window.pattern_if_any() {
            Some(pattern) => {
                self.engine.set_baseline(pattern.into());
                true
            }
            None => false,
        }
    }

    pub fn has_baseline(&self) -> bool {
        self.engine.has_baseline()
    }

    pub fn baseline(&self) -> Option<&TypingBaseline> {
        self.engine.baseline()
    }

    // ------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------

    pub fn force_bot_typing(&mut self) {
        self.simulation.force_bot_typing();
    }

    pub fn force_impossible_travel(&mut self) {
        self.simulation.force_impossible_travel();
    }

    pub fn simulate(&mut self, attack: SimulatedAttack) {
        self.simulation.arm(attack);
    }

    pub fn clear_simulations(&mut self) {
        self.simulation.clear();
    }

    pub fn simulation(&self) -> &SimulationFlags {
        &self.simulation
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Snapshot the session into an engine input at `local_time`
    pub fn evaluation_input(&self, local_time: DateTime<FixedOffset>) -> EvaluationInput {
        EvaluationInput {
            current_typing: self.window.pattern_if_any(),
            location: self.location,
            device_stability: self.window.stability(),
            login_failures: self.login_failures,
            injection_detected: self.injection_detected,
            device: self.device.clone(),
            local_time,
        }
    }

    pub fn evaluate(&mut self, local_time: DateTime<FixedOffset>) -> TrustScore {
        let input = self.evaluation_input(local_time);
        let trust = self.engine.evaluate(&input, &self.simulation);
        self.last_score = Some(trust.clone());
        trust
    }

    pub fn last_score(&self) -> Option<&TrustScore> {
        self.last_score.as_ref()
    }

    /// Action for the latest score; a session never evaluated is allowed
    pub fn security_action(&self) -> SecurityAction {
        self.last_score
            .as_ref()
            .map_or(SecurityAction::Allow, TrustScore::action)
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::new(self.engine.config().thresholds)
    }

    pub fn stability(&self) -> u8 {
        self.window.stability()
    }

    pub fn current_pattern(&self) -> TypingPattern {
        self.window.current_pattern()
    }

    pub fn typing_window_is_empty(&self) -> bool {
        self.window.typing().is_empty()
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        self.engine.performance_stats()
    }

    pub fn engine_mut(&mut self) -> &mut TrustEngine {
        &mut self.engine
    }

    /// Start over: typing window, baseline, simulations, login and injection state.
    ///
    /// Stability is kept unless the configured reset scope includes the device.
    pub fn reset_session(&mut self) {
        self.reset_signals();
        self.engine.clear_baseline();
    }

    /// Clear captured signals, simulations, login and injection state, keeping
    /// the established baseline.
    pub fn reset_signals(&mut self) {
        log::info!("session {}: reset", self.id);
        self.window.reset(self.engine.config().reset_scope);
        self.simulation.clear();
        self.login_failures = 0;
        self.injection_detected = false;
        self.last_score = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LevelThresholds, ResetScope};
    use crate::overrides::{OverrideVerdict, ScoreAdjustment, ScoreOverride};
    use crate::policy::BalanceVisibility;
    use crate::types::{FactorKind, FactorStatus, TrustLevel};
    use chrono::{TimeZone, Timelike};

    fn noon() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .unwrap()
    }

    fn type_rhythm(session: &mut TrustSession, start: u64, intervals: &[u64]) -> u64 {
        let mut t = start;
        session.record_keystroke(t).unwrap();
        for &i in intervals {
            t += i;
            session.record_keystroke(t).unwrap();
        }
        t
    }

    #[test]
    fn test_keystrokes_flow_into_typing_factor() {
        let mut session = TrustSession::default();
        session.set_baseline(TypingBaseline::reference());
        type_rhythm(&mut session, 0, &[190, 210, 200, 200]);

        let trust = session.evaluate(noon());
        let typing = trust.factor(FactorKind::Typing).unwrap();
        assert_eq!(typing.status, FactorStatus::Match);
        assert!(typing.score >= 90);
        assert_eq!(session.security_action(), SecurityAction::Allow);
    }

    #[test]
    fn test_establish_baseline_from_window() {
        let mut session = TrustSession::default();
        assert!(!session.establish_baseline_from_window());

        type_rhythm(&mut session, 0, &[100, 200, 300]);
        assert!(session.establish_baseline_from_window());
        let baseline = session.baseline().unwrap();
        assert!((baseline.mean_interval_ms - 200.0).abs() < 1e-9);

        let trust = session.evaluate(noon());
        assert_eq!(trust.factor(FactorKind::Typing).unwrap().score, 100);
    }

    #[test]
    fn test_login_failures_and_success() {
        let mut session = TrustSession::default();
        for _ in 0..5 {
            session.record_login_failure();
        }
        let trust = session.evaluate(noon());
        assert!(trust.score <= 40);

        assert_eq!(session.record_login_success(), LoginOutcome::StepUpRequired);
        assert_eq!(session.login_failures(), 5);
        assert!(session.evaluate(noon()).score <= 40);

        session.reset_signals();
        assert!(session.evaluate(noon()).score > 40);
    }

    #[test]
    fn test_login_success_below_threshold_clears_failures() {
        let mut session = TrustSession::default();
        for _ in 0..4 {
            session.record_login_failure();
        }
        assert_eq!(session.record_login_success(), LoginOutcome::Accepted);
        assert_eq!(session.login_failures(), 0);
        assert_eq!(session.evaluate(noon()).score, 94);
    }

    #[test]
    fn test_typing_score_uses_whole_millisecond_mean() {
        let mut session = TrustSession::default();
        session.set_baseline(TypingBaseline::reference());
        type_rhythm(&mut session, 0, &[201, 200, 200]);

        let trust = session.evaluate(noon());
        assert_eq!(trust.factor(FactorKind::Typing).unwrap().score, 95);
    }

    #[test]
    fn test_credential_screening_latches_injection() {
        let mut session = TrustSession::default();
        assert!(!session.screen_credentials("user"));
        assert!(session.screen_credentials("admin' OR '1'='1"));
        assert!(session.injection_detected());

        let trust = session.evaluate(noon());
        assert_eq!(trust.score, 0);
        assert_eq!(session.security_action(), SecurityAction::Deny);
    }

    #[test]
    fn test_reset_returns_to_unattacked_score() {
        let mut session = TrustSession::default();
        session.set_baseline(TypingBaseline::reference());
        let clean = session.evaluate(noon()).score;

        type_rhythm(&mut session, 0, &[20, 20, 20, 20, 20]);
        session.force_bot_typing();
        session.force_impossible_travel();
        let attacked = session.evaluate(noon());
        assert!(attacked.score < clean);

        session.reset_session();
        assert!(session.typing_window_is_empty());
        assert!(!session.simulation().any_active());
        assert!(!session.has_baseline());

        session.set_baseline(TypingBaseline::reference());
        let restored = session.evaluate(noon());
        assert_eq!(restored.score, clean);
        assert_eq!(restored.level, TrustLevel::High);
    }

    #[test]
    fn test_signal_reset_keeps_baseline_and_restores_score() {
        let mut session = TrustSession::default();
        session.set_baseline(TypingBaseline::reference());
        let clean = session.evaluate(noon());

        type_rhythm(&mut session, 0, &[20, 20, 20, 20, 20]);
        session.force_bot_typing();
        session.force_impossible_travel();
        assert!(session.evaluate(noon()).score < clean.score);

        session.reset_signals();
        assert!(session.has_baseline());
        assert!(session.typing_window_is_empty());
        assert!(!session.simulation().any_active());

        let restored = session.evaluate(noon());
        assert_eq!(restored.score, clean.score);
        assert_eq!(restored.level, clean.level);
    }

    #[test]
    fn test_access_policy_follows_configured_thresholds() {
        let config = EngineConfig {
            thresholds: LevelThresholds {
                high: 98,
                medium: 95,
                low: 30,
            },
            ..EngineConfig::default()
        };
        let mut session = TrustSession::new(config).unwrap();
        assert!(session.access_policy().can_transfer(session.last_score()));

        // No signals scores 94: below the raised medium bar
        session.evaluate(noon());
        let policy = session.access_policy();
        assert!(!policy.can_transfer(session.last_score()));
        assert_eq!(
            policy.balance_visibility(session.last_score()),
            BalanceVisibility::Hidden
        );

        let mut session = TrustSession::default();
        session.evaluate(noon());
        assert!(session.access_policy().can_transfer(session.last_score()));
        assert_eq!(
            session.access_policy().balance_visibility(session.last_score()),
            BalanceVisibility::Full
        );
    }

    #[derive(Debug)]
    struct NightLock;

    impl ScoreOverride for NightLock {
        fn name(&self) -> &str {
            "night_lock"
        }

        fn check(&self, input: &EvaluationInput) -> Option<OverrideVerdict> {
            (input.local_time.hour() < 6).then_some(OverrideVerdict {
                adjustment: ScoreAdjustment::Cap(45),
                factor: None,
            })
        }
    }

    #[test]
    fn test_engine_mut_accepts_custom_override() {
        let mut session = TrustSession::default();
        session.engine_mut().add_override(NightLock);

        assert_eq!(session.evaluate(noon()).score, 94);

        let night = noon().with_hour(3).unwrap();
        let trust = session.evaluate(night);
        assert_eq!(trust.score, 45);
        assert_eq!(trust.level, TrustLevel::Low);
    }

    #[test]
    fn test_reset_scope_controls_stability() {
        let mut session = TrustSession::default();
        session.record_motion_sample(12.0, 12.0, 12.0, 1_000).unwrap();
        assert_eq!(session.stability(), 95);
        session.reset_session();
        assert_eq!(session.stability(), 95);

        let config = EngineConfig {
            reset_scope: ResetScope::SessionAndDevice,
            ..EngineConfig::default()
        };
        let mut session = TrustSession::new(config).unwrap();
        session.record_motion_sample(12.0, 12.0, 12.0, 1_000).unwrap();
        session.reset_session();
        assert_eq!(session.stability(), 100);
    }

    #[test]
    fn test_invalid_location_is_rejected() {
        let mut session = TrustSession::default();
        let bad = LocationFix {
            latitude: 123.0,
            longitude: 0.0,
            accuracy_m: None,
        };
        assert!(session.set_location(Some(bad)).is_err());
        assert!(session.set_location(Some(LocationFix::new(1.0, 2.0).unwrap())).is_ok());
        assert!(session.set_location(None).is_ok());
    }

    #[test]
    fn test_shared_session_across_threads() {
        let shared = TrustSession::default().into_shared();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let session = Arc::clone(&shared);
                std::thread::spawn(move || {
                    let mut guard = lock_session(&session).unwrap();
                    guard.record_login_failure();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(lock_session(&shared).unwrap().login_failures(), 4);
    }

    #[test]
    fn test_poisoned_session_reports_locked() {
        let shared = TrustSession::default().into_shared();
        let poisoner = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("host thread crashed mid-update");
        })
        .join();

        assert!(matches!(lock_session(&shared), Err(TrustError::SessionLocked)));
    }
}
