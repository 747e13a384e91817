//! Engine configuration
//!
//! Every tunable constant of the engine lives here. `EngineConfig::default()`
//! reproduces the reference calibration; hosts can override individual
//! fields from JSON since every section is `#[serde(default)]`.

use serde::{Deserialize, Serialize};

use crate::error::TrustError;

/// Intervals above this are treated as a field switch or pause (ms)
pub const DEFAULT_PAUSE_CEILING_MS: u64 = 1_500;

/// Maximum number of retained keystroke intervals
pub const DEFAULT_MAX_TYPING_SAMPLES: usize = 256;

/// Admitted intervals required before a keystroke yields a pattern
pub const DEFAULT_MIN_PATTERN_SAMPLES: usize = 3;

/// Standard gravity subtracted from the accelerometer magnitude (m/s²)
pub const DEFAULT_GRAVITY: f64 = 9.81;

/// Number of evaluations kept for the rolling latency average
pub const DEFAULT_LATENCY_WINDOW: usize = 100;

/// Upper bound for every sample window (keystroke intervals, latency ring)
pub const MAX_WINDOW_SIZE: usize = 65_536;

/// Minimum supported platform version (Android 8.0 / API 26)
pub const DEFAULT_MIN_PLATFORM_VERSION: u32 = 26;

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: FactorWeights,
    pub thresholds: LevelThresholds,
    pub typing: TypingConfig,
    pub stability: StabilityConfig,
    pub device: DeviceConfig,
    pub overrides: OverrideConfig,
    /// Evaluations kept in the latency ring buffer
    pub latency_window: usize,
    pub reset_scope: ResetScope,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            thresholds: LevelThresholds::default(),
            typing: TypingConfig::default(),
            stability: StabilityConfig::default(),
            device: DeviceConfig::default(),
            overrides: OverrideConfig::default(),
            latency_window: DEFAULT_LATENCY_WINDOW,
            reset_scope: ResetScope::default(),
        }
    }
}

/// Weights of the four blended factors. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorWeights {
    pub typing: f64,
    pub device: f64,
    pub location: f64,
    pub time: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            typing: 0.40,
            device: 0.25,
            location: 0.20,
            time: 0.15,
        }
    }
}

impl FactorWeights {
    pub fn sum(&self) -> f64 {
        self.typing + self.device + self.location + self.time
    }
}

/// Lower bounds (inclusive) of each trust level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelThresholds {
    pub high: u8,
    pub medium: u8,
    pub low: u8,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            high: 80,
            medium: 50,
            low: 30,
        }
    }
}

/// Keystroke capture and typing similarity settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    pub pause_ceiling_ms: u64,
    pub max_samples: usize,
    pub min_pattern_samples: usize,
    /// Allowed mean deviation as a multiple of the baseline mean
    pub interval_tolerance: f64,
    /// Allowed variance deviation as a multiple of the baseline variance
    pub variance_tolerance: f64,
    pub match_threshold: u8,
    pub suspicious_threshold: u8,
    /// Pressure samples needed (exclusive) for high confidence
    pub pressure_samples_for_confidence: usize,
    pub high_confidence: u8,
    pub low_confidence: u8,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            pause_ceiling_ms: DEFAULT_PAUSE_CEILING_MS,
            max_samples: DEFAULT_MAX_TYPING_SAMPLES,
            min_pattern_samples: DEFAULT_MIN_PATTERN_SAMPLES,
            interval_tolerance: 5.0,
            variance_tolerance: 10.0,
            match_threshold: 50,
            suspicious_threshold: 25,
            pressure_samples_for_confidence: 10,
            high_confidence: 90,
            low_confidence: 60,
        }
    }
}

/// Motion stability estimator and the penalty it feeds into the blend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub gravity: f64,
    pub movement_threshold: f64,
    pub refractory_ms: u64,
    pub shake_penalty: u8,
    pub recovery_step: u8,
    /// Stability below this value is penalized in the blend
    pub penalty_below: u8,
    pub penalty_factor: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            gravity: DEFAULT_GRAVITY,
            movement_threshold: 2.0,
            refractory_ms: 500,
            shake_penalty: 5,
            recovery_step: 1,
            penalty_below: 80,
            penalty_factor: 0.1,
        }
    }
}

/// Device integrity penalties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub root_penalty: u8,
    pub outdated_penalty: u8,
    pub developer_mode_penalty: u8,
    pub min_platform_version: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            root_penalty: 50,
            outdated_penalty: 20,
            developer_mode_penalty: 10,
            min_platform_version: DEFAULT_MIN_PLATFORM_VERSION,
        }
    }
}

/// Hard security overrides applied after the blend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideConfig {
    pub login_failure_threshold: u32,
    pub login_failure_cap: u8,
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            login_failure_threshold: 5,
            login_failure_cap: 40,
        }
    }
}

/// What a session reset clears besides the typing window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetScope {
    /// Stability is environmental and survives resets
    #[default]
    Session,
    /// Stability is reset to full as well
    SessionAndDevice,
}

impl EngineConfig {
    /// Load a configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self, TrustError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, TrustError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), TrustError> {
        let w = &self.weights;
        if [w.typing, w.device, w.location, w.time]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(TrustError::InvalidConfig(
                "factor weights must be finite and non-negative".to_string(),
            ));
        }
        if (w.sum() - 1.0).abs() > 1e-6 {
            return Err(TrustError::InvalidConfig(format!(
                "factor weights must sum to 1.0, got {}",
                w.sum()
            )));
        }

        let t = &self.thresholds;
        if !(t.high <= 100 && t.high > t.medium && t.medium > t.low) {
            return Err(TrustError::InvalidConfig(format!(
                "level thresholds must be strictly descending within 0-100, got {}/{}/{}",
                t.high, t.medium, t.low
            )));
        }

        let typing = &self.typing;
        if typing.max_samples == 0 || typing.min_pattern_samples == 0 {
            return Err(TrustError::InvalidConfig(
                "typing window sizes must be positive".to_string(),
            ));
        }
        if typing.max_samples > MAX_WINDOW_SIZE || typing.min_pattern_samples > typing.max_samples {
            return Err(TrustError::InvalidConfig(format!(
                "typing window must hold at most {} intervals and at least min_pattern_samples, got {}/{}",
                MAX_WINDOW_SIZE, typing.max_samples, typing.min_pattern_samples
            )));
        }
        if !(typing.interval_tolerance > 0.0 && typing.variance_tolerance > 0.0) {
            return Err(TrustError::InvalidConfig(
                "typing tolerances must be positive".to_string(),
            ));
        }
        if typing.suspicious_threshold > typing.match_threshold {
            return Err(TrustError::InvalidConfig(
                "typing suspicious threshold must not exceed match threshold".to_string(),
            ));
        }

        if !(self.stability.gravity.is_finite()
            && self.stability.movement_threshold.is_finite()
            && self.stability.penalty_factor.is_finite())
        {
            return Err(TrustError::InvalidConfig(
                "stability parameters must be finite".to_string(),
            ));
        }

        if self.overrides.login_failure_cap > 100 {
            return Err(TrustError::InvalidConfig(
                "login failure cap must be within 0-100".to_string(),
            ));
        }

        if self.latency_window == 0 || self.latency_window > MAX_WINDOW_SIZE {
            return Err(TrustError::InvalidConfig(format!(
                "latency window must be within 1-{}, got {}",
                MAX_WINDOW_SIZE, self.latency_window
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.weights.sum() - 1.0).abs() < 1e-9);
        assert_eq!(config.latency_window, DEFAULT_LATENCY_WINDOW);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "thresholds": { "high": 90 }, "reset_scope": "session_and_device" }"#;
        let config = EngineConfig::from_json(json).unwrap();

        assert_eq!(config.thresholds.high, 90);
        assert_eq!(config.thresholds.medium, 50);
        assert_eq!(config.reset_scope, ResetScope::SessionAndDevice);
        assert_eq!(config.typing.pause_ceiling_ms, DEFAULT_PAUSE_CEILING_MS);
        assert_eq!(config.latency_window, DEFAULT_LATENCY_WINDOW);
    }

    #[test]
    fn test_rejects_unbalanced_weights() {
        let json = r#"{ "weights": { "typing": 0.5 } }"#;
        let err = EngineConfig::from_json(json).unwrap_err();
        assert!(matches!(err, TrustError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let mut config = EngineConfig::default();
        config.thresholds.medium = 85;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_windows() {
        let mut config = EngineConfig::default();
        config.typing.max_samples = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.latency_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_windows() {
        let json = r#"{ "typing": { "max_samples": 18446744073709551615 } }"#;
        assert!(matches!(
            EngineConfig::from_json(json),
            Err(TrustError::InvalidConfig(_))
        ));

        let json = r#"{ "latency_window": 18446744073709551615 }"#;
        assert!(EngineConfig::from_json(json).is_err());

        let mut config = EngineConfig::default();
        config.typing.max_samples = MAX_WINDOW_SIZE;
        assert!(config.validate().is_ok());
        config.typing.max_samples = MAX_WINDOW_SIZE + 1;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.typing.min_pattern_samples = config.typing.max_samples + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip_preserves_values() {
        let mut config = EngineConfig::default();
        config.stability.refractory_ms = 750;
        let json = config.to_json().unwrap();
        let loaded = EngineConfig::from_json(&json).unwrap();
        assert_eq!(loaded, config);
    }
}
