//! Core data types
//!
//! Value types that flow from the signal window through the factor scorers
//! into the trust engine. Everything here is plain data: produced fresh on
//! each evaluation and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::DEFAULT_MIN_PLATFORM_VERSION;
use crate::error::TrustError;

/// Filesystem markers left behind by common superuser installs
pub const ROOT_MARKER_PATHS: [&str; 9] = [
    "/system/app/Superuser.apk",
    "/sbin/su",
    "/system/bin/su",
    "/system/xbin/su",
    "/data/local/xbin/su",
    "/data/local/bin/su",
    "/system/sd/xbin/su",
    "/system/bin/failsafe/su",
    "/data/local/su",
];

/// Signal categories contributing to the trust score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    Typing,
    Device,
    Location,
    Time,
    /// Only present when a hard override fired
    Security,
}

impl FactorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactorKind::Typing => "typing",
            FactorKind::Device => "device",
            FactorKind::Location => "location",
            FactorKind::Time => "time",
            FactorKind::Security => "security",
        }
    }
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device integrity problem found during the device check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceIssue {
    Rooted,
    OutdatedOs,
    DeveloperMode,
}

impl fmt::Display for DeviceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceIssue::Rooted => "Rooted",
            DeviceIssue::OutdatedOs => "Outdated OS",
            DeviceIssue::DeveloperMode => "Dev mode",
        })
    }
}

/// Status label attached to a factor score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorStatus {
    // Typing
    Match,
    Suspicious,
    Anomaly,
    BotDetected,
    NoBaseline,

    // Device
    Secure,
    Compromised(Vec<DeviceIssue>),

    // Location
    Expected,
    Unknown,
    ImpossibleTravel,

    // Time
    NormalHours,
    LateNight,
    UnusualTime,

    // Security overrides
    TooManyAttempts,
    SqlInjection,

    /// Free-form label produced by a custom override rule
    #[serde(untagged)]
    Custom(String),
}

impl fmt::Display for FactorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorStatus::Match => f.write_str("Match"),
            FactorStatus::Suspicious => f.write_str("Suspicious"),
            FactorStatus::Anomaly => f.write_str("Anomaly"),
            FactorStatus::BotDetected => f.write_str("Bot detected"),
            FactorStatus::NoBaseline => f.write_str("No baseline"),
            FactorStatus::Secure => f.write_str("Secure"),
            FactorStatus::Compromised(issues) => {
                let labels: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
                f.write_str(&labels.join(", "))
            }
            FactorStatus::Expected => f.write_str("Expected"),
            FactorStatus::Unknown => f.write_str("Unknown"),
            FactorStatus::ImpossibleTravel => f.write_str("Impossible travel"),
            FactorStatus::NormalHours => f.write_str("Normal hours"),
            FactorStatus::LateNight => f.write_str("Late night"),
            FactorStatus::UnusualTime => f.write_str("Unusual time"),
            FactorStatus::TooManyAttempts => f.write_str("Too many attempts"),
            FactorStatus::SqlInjection => f.write_str("SQL injection"),
            FactorStatus::Custom(label) => f.write_str(label),
        }
    }
}

/// Score produced by one factor scorer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorScore {
    pub name: FactorKind,
    /// Sub-score (0-100)
    pub score: u8,
    /// Confidence in the sub-score (0-100)
    pub confidence: u8,
    pub status: FactorStatus,
}

impl FactorScore {
    /// Build a factor score, clamping both values into 0-100
    pub fn new(name: FactorKind, score: u8, confidence: u8, status: FactorStatus) -> Self {
        Self {
            name,
            score: score.min(100),
            confidence: confidence.min(100),
            status,
        }
    }
}

/// Discrete trust classification, ordered from least to most trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Critical,
    Low,
    Medium,
    High,
}

impl TrustLevel {
    /// Security action required at this level
    pub fn action(&self) -> SecurityAction {
        match self {
            TrustLevel::High => SecurityAction::Allow,
            TrustLevel::Medium => SecurityAction::StepUpAuth,
            TrustLevel::Low => SecurityAction::Challenge,
            TrustLevel::Critical => SecurityAction::Deny,
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrustLevel::High => "HIGH",
            TrustLevel::Medium => "MEDIUM",
            TrustLevel::Low => "LOW",
            TrustLevel::Critical => "CRITICAL",
        })
    }
}

/// Action the host must take for a given trust level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityAction {
    Allow,
    StepUpAuth,
    Challenge,
    Deny,
}

/// Result of one evaluation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
    /// Final score (0-100)
    pub score: u8,
    pub level: TrustLevel,
    /// Per-factor breakdown, keyed by factor name
    pub factors: BTreeMap<FactorKind, FactorScore>,
    /// Wall-clock time spent computing this score, in microseconds
    pub computation_latency_us: u64,
}

impl TrustScore {
    pub fn action(&self) -> SecurityAction {
        self.level.action()
    }

    pub fn factor(&self, kind: FactorKind) -> Option<&FactorScore> {
        self.factors.get(&kind)
    }
}

/// Coarse typing speed label derived from the mean interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypingRhythm {
    NoData,
    Fast,
    Normal,
    Slow,
}

impl TypingRhythm {
    pub fn from_mean_interval(mean_ms: f64) -> Self {
        if mean_ms < 150.0 {
            TypingRhythm::Fast
        } else if mean_ms < 300.0 {
            TypingRhythm::Normal
        } else {
            TypingRhythm::Slow
        }
    }
}

/// Statistics over the currently retained keystroke intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingPattern {
    /// Mean inter-keystroke interval, truncated to whole milliseconds
    pub mean_interval_ms: f64,
    /// Population variance of the intervals (ms²)
    pub variance: f64,
    pub sample_count: usize,
    pub rhythm: TypingRhythm,
    /// Touch pressure readings, when the host can supply them
    #[serde(default)]
    pub pressure_samples: Vec<f32>,
}

impl TypingPattern {
    /// The "no data" pattern returned for an empty window
    pub fn empty() -> Self {
        Self {
            mean_interval_ms: 0.0,
            variance: 0.0,
            sample_count: 0,
            rhythm: TypingRhythm::NoData,
            pressure_samples: Vec::new(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.sample_count > 0
    }
}

/// Reference typing pattern a live sample is compared against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingBaseline {
    pub mean_interval_ms: f64,
    pub variance: f64,
    #[serde(default)]
    pub pressure_samples: Vec<f32>,
}

impl TypingBaseline {
    pub fn new(mean_interval_ms: f64, variance: f64) -> Result<Self, TrustError> {
        if !(mean_interval_ms.is_finite() && variance.is_finite()) {
            return Err(TrustError::NonFiniteSample(
                "baseline mean and variance must be finite".to_string(),
            ));
        }
        if mean_interval_ms < 0.0 || variance < 0.0 {
            return Err(TrustError::InvalidInput(
                "baseline mean and variance must be non-negative".to_string(),
            ));
        }
        Ok(Self {
            mean_interval_ms,
            variance,
            pressure_samples: Vec::new(),
        })
    }

    pub fn with_pressure_samples(mut self, samples: Vec<f32>) -> Self {
        self.pressure_samples = samples;
        self
    }

    /// Calibration pattern used by the demo application: 200ms rhythm, variance 500
    pub fn reference() -> Self {
        Self {
            mean_interval_ms: 200.0,
            variance: 500.0,
            pressure_samples: vec![0.5, 0.6, 0.5, 0.7, 0.6],
        }
    }
}

impl From<TypingPattern> for TypingBaseline {
    fn from(pattern: TypingPattern) -> Self {
        Self {
            mean_interval_ms: pattern.mean_interval_ms,
            variance: pattern.variance,
            pressure_samples: pattern.pressure_samples,
        }
    }
}

/// A location fix supplied by the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

impl LocationFix {
    /// Validate and build a location fix
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, TrustError> {
        let fix = Self {
            latitude,
            longitude,
            accuracy_m: None,
        };
        fix.validate()?;
        Ok(fix)
    }

    /// Attach a horizontal accuracy, rejecting negative or non-finite values
    pub fn with_accuracy(mut self, accuracy_m: f64) -> Result<Self, TrustError> {
        self.accuracy_m = Some(accuracy_m);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), TrustError> {
        let in_range = self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude);
        if !in_range {
            return Err(TrustError::InvalidCoordinates {
                latitude: self.latitude,
                longitude: self.longitude,
            });
        }
        if let Some(accuracy) = self.accuracy_m {
            if !(accuracy.is_finite() && accuracy >= 0.0) {
                return Err(TrustError::InvalidInput(format!(
                    "location accuracy must be a non-negative distance, got {accuracy}"
                )));
            }
        }
        Ok(())
    }
}

/// Device integrity snapshot supplied by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIntegrity {
    /// Root markers found on the device
    #[serde(default)]
    pub root_markers: Vec<String>,
    /// Platform version (Android API level or equivalent)
    pub platform_version: u32,
    #[serde(default)]
    pub developer_mode: bool,
}

impl Default for DeviceIntegrity {
    fn default() -> Self {
        Self {
            root_markers: Vec::new(),
            platform_version: DEFAULT_MIN_PLATFORM_VERSION,
            developer_mode: false,
        }
    }
}

impl DeviceIntegrity {
    /// Build a snapshot by asking `exists` about each known root marker.
    ///
    /// The probe is supplied by the host; the engine never touches the
    /// filesystem itself.
    pub fn probe<F>(exists: F, platform_version: u32, developer_mode: bool) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let root_markers = ROOT_MARKER_PATHS
            .iter()
            .filter(|path| exists(**path))
            .map(|path| path.to_string())
            .collect();

        Self {
            root_markers,
            platform_version,
            developer_mode,
        }
    }

    pub fn is_rooted(&self) -> bool {
        !self.root_markers.is_empty()
    }
}

/// Latency statistics over the recent evaluations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub last_latency_us: u64,
    pub average_latency_us: f64,
    pub sample_count: usize,
}
