//! Trust score computation
//!
//! The engine is recompute-on-demand: every call to `evaluate` runs the full
//! pipeline from the current inputs, with no smoothing between calls.
//!
//! factors → weighted blend → stability penalty → override pipeline → clamp → level

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::{EngineConfig, LevelThresholds};
use crate::error::TrustError;
use crate::factors::{score_device, score_location, score_time_of_day, score_typing};
use crate::overrides::{OverridePipeline, ScoreOverride};
use crate::signal::MAX_STABILITY;
use crate::simulation::SimulationFlags;
use crate::telemetry::LatencyTracker;
use crate::types::{
    DeviceIntegrity, FactorKind, LocationFix, PerformanceStats, SecurityAction, TrustLevel,
    TrustScore, TypingBaseline, TypingPattern,
};

/// Everything one evaluation consumes from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInput {
    /// Live typing pattern, if any intervals have been captured
    #[serde(default)]
    pub current_typing: Option<TypingPattern>,
    #[serde(default)]
    pub location: Option<LocationFix>,
    /// Device stability (0-100)
    pub device_stability: u8,
    /// Consecutive failed login attempts
    #[serde(default)]
    pub login_failures: u32,
    #[serde(default)]
    pub injection_detected: bool,
    #[serde(default)]
    pub device: DeviceIntegrity,
    /// Local wall-clock time used for the time-of-day factor
    pub local_time: DateTime<FixedOffset>,
}

impl Default for EvaluationInput {
    fn default() -> Self {
        Self::at(Utc::now().fixed_offset())
    }
}

impl EvaluationInput {
    /// Input with no signals beyond a fully stable, secure device at `local_time`
    pub fn at(local_time: DateTime<FixedOffset>) -> Self {
        Self {
            current_typing: None,
            location: None,
            device_stability: MAX_STABILITY,
            login_failures: 0,
            injection_detected: false,
            device: DeviceIntegrity::default(),
            local_time,
        }
    }
}

/// Multi-factor trust scoring engine for one session
#[derive(Debug)]
pub struct TrustEngine {
    config: EngineConfig,
    baseline: Option<TypingBaseline>,
    overrides: OverridePipeline,
    latency: LatencyTracker,
}

impl Default for TrustEngine {
    fn default() -> Self {
        Self::with_validated_config(EngineConfig::default())
    }
}

impl TrustEngine {
    /// Create an engine, rejecting an invalid configuration
    pub fn new(config: EngineConfig) -> Result<Self, TrustError> {
        config.validate()?;
        Ok(Self::with_validated_config(config))
    }

    fn with_validated_config(config: EngineConfig) -> Self {
        Self {
            overrides: OverridePipeline::standard(&config.overrides),
            latency: LatencyTracker::new(config.latency_window),
            baseline: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the typing baseline
    pub fn set_baseline(&mut self, baseline: TypingBaseline) {
        log::info!(
            "typing baseline set: mean {:.1}ms, variance {:.1}",
            baseline.mean_interval_ms,
            baseline.variance
        );
        self.baseline = Some(baseline);
    }

    pub fn clear_baseline(&mut self) {
        self.baseline = None;
    }

    pub fn baseline(&self) -> Option<&TypingBaseline> {
        self.baseline.as_ref()
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Append an override rule after the built-in ones
    pub fn add_override<R: ScoreOverride + 'static>(&mut self, rule: R) {
        self.overrides.push(Box::new(rule));
    }

    /// Compute a fresh trust score from `input`
    pub fn evaluate(&mut self, input: &EvaluationInput, simulation: &SimulationFlags) -> TrustScore {
        let started = Instant::now();
        let weights = &self.config.weights;

        let typing = score_typing(
            input.current_typing.as_ref(),
            self.baseline.as_ref(),
            simulation,
            &self.config.typing,
        );
        let device = score_device(&input.device, &self.config.device);
        let location = score_location(input.location.as_ref(), simulation);
        let time = score_time_of_day(&input.local_time);

        let mut weighted = f64::from(typing.score) * weights.typing
            + f64::from(device.score) * weights.device
            + f64::from(location.score) * weights.location
            + f64::from(time.score) * weights.time;

        let stability = input.device_stability.min(MAX_STABILITY);
        if stability < self.config.stability.penalty_below {
            weighted -= f64::from(MAX_STABILITY - stability) * self.config.stability.penalty_factor;
        }

        let mut factors = BTreeMap::new();
        for factor in [typing, device, location, time] {
            factors.insert(factor.name, factor);
        }

        let adjusted = self.overrides.apply(weighted, input, &mut factors);
        let score = (adjusted as i32).clamp(0, 100) as u8;
        let level = classify(score, &self.config.thresholds);

        let computation_latency_us = self.latency.record(started.elapsed());
        log::debug!(
            "trust evaluated: score {} ({}), blend {:.2}, {}us",
            score,
            level,
            weighted,
            computation_latency_us
        );

        TrustScore {
            score,
            level,
            factors,
            computation_latency_us,
        }
    }

    pub fn classify(&self, score: u8) -> TrustLevel {
        classify(score, &self.config.thresholds)
    }

    pub fn security_action(&self, trust: &TrustScore) -> SecurityAction {
        trust.action()
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        self.latency.stats()
    }
}

/// Map a score onto the level ladder
pub fn classify(score: u8, thresholds: &LevelThresholds) -> TrustLevel {
    if score >= thresholds.high {
        TrustLevel::High
    } else if score >= thresholds.medium {
        TrustLevel::Medium
    } else if score >= thresholds.low {
        TrustLevel::Low
    } else {
        TrustLevel::Critical
    }
}

/// Security action for a trust score
pub fn security_action(trust: &TrustScore) -> SecurityAction {
    trust.action()
}

/// Sum of the per-factor contributions, for callers inspecting a breakdown
pub fn weighted_contribution(trust: &TrustScore, config: &EngineConfig) -> f64 {
    let w = &config.weights;
    trust
        .factors
        .values()
        .map(|factor| {
            let weight = match factor.name {
                FactorKind::Typing => w.typing,
                FactorKind::Device => w.device,
                FactorKind::Location => w.location,
                FactorKind::Time => w.time,
                FactorKind::Security => 0.0,
            };
            f64::from(factor.score) * weight
        })
        .sum()
}
