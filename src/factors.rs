//! Factor scorers
//!
//! Four independent scoring functions, one per signal category. Each maps its
//! inputs to a bounded sub-score, a confidence and a status label. None of
//! them fail: missing inputs produce neutral, low-confidence scores.

use chrono::Timelike;

use crate::config::{DeviceConfig, TypingConfig};
use crate::simulation::SimulationFlags;
use crate::types::{
    DeviceIntegrity, DeviceIssue, FactorKind, FactorScore, FactorStatus, LocationFix,
    TypingBaseline, TypingPattern,
};

/// Typing score when a bot cadence is being simulated
const BOT_TYPING_SCORE: u8 = 10;

/// Location score when impossible travel is being simulated
const IMPOSSIBLE_TRAVEL_SCORE: u8 = 5;

/// Confidence attached to simulated attacks
const SIMULATION_CONFIDENCE: u8 = 99;

const DEVICE_CONFIDENCE: u8 = 95;
const TIME_CONFIDENCE: u8 = 90;

/// Score a live typing pattern against the session baseline.
///
/// The similarity is the mean of two ratios: mean interval deviation relative
/// to `interval_tolerance × baseline mean`, and variance deviation relative to
/// `variance_tolerance × baseline variance`. Each ratio is clamped to [0, 1]
/// before being scaled to 0-100.
pub fn score_typing(
    current: Option<&TypingPattern>,
    baseline: Option<&TypingBaseline>,
    simulation: &SimulationFlags,
    config: &TypingConfig,
) -> FactorScore {
    if simulation.bot_typing() {
        return FactorScore::new(
            FactorKind::Typing,
            BOT_TYPING_SCORE,
            SIMULATION_CONFIDENCE,
            FactorStatus::BotDetected,
        );
    }

    let (current, baseline) = match (current, baseline) {
        (Some(current), Some(baseline)) => (current, baseline),
        _ => return FactorScore::new(FactorKind::Typing, 100, 0, FactorStatus::NoBaseline),
    };

    let interval_similarity = similarity(
        current.mean_interval_ms,
        baseline.mean_interval_ms,
        config.interval_tolerance,
    );
    let variance_similarity =
        similarity(current.variance, baseline.variance, config.variance_tolerance);

    let score = ((interval_similarity + variance_similarity) / 2.0) as u8;
    let confidence = if current.pressure_samples.len() > config.pressure_samples_for_confidence {
        config.high_confidence
    } else {
        config.low_confidence
    };

    let status = if score >= config.match_threshold {
        FactorStatus::Match
    } else if score >= config.suspicious_threshold {
        FactorStatus::Suspicious
    } else {
        FactorStatus::Anomaly
    };

    FactorScore::new(FactorKind::Typing, score, confidence, status)
}

/// Similarity (0-100) of `current` to `reference` with `tolerance × reference` slack
fn similarity(current: f64, reference: f64, tolerance: f64) -> f64 {
    let diff = (current - reference).abs();
    let allowed = reference * tolerance;

    // A zero reference only matches itself exactly
    let ratio = if allowed > 0.0 {
        (diff / allowed).clamp(0.0, 1.0)
    } else if diff == 0.0 {
        0.0
    } else {
        1.0
    };

    (1.0 - ratio) * 100.0
}

/// Score the integrity of the device the session runs on
pub fn score_device(device: &DeviceIntegrity, config: &DeviceConfig) -> FactorScore {
    let mut score: i32 = 100;
    let mut issues = Vec::new();

    if device.is_rooted() {
        score -= i32::from(config.root_penalty);
        issues.push(DeviceIssue::Rooted);
    }

    if device.platform_version < config.min_platform_version {
        score -= i32::from(config.outdated_penalty);
        issues.push(DeviceIssue::OutdatedOs);
    }

    if device.developer_mode {
        score -= i32::from(config.developer_mode_penalty);
        issues.push(DeviceIssue::DeveloperMode);
    }

    let status = if issues.is_empty() {
        FactorStatus::Secure
    } else {
        FactorStatus::Compromised(issues)
    };

    FactorScore::new(
        FactorKind::Device,
        score.clamp(0, 100) as u8,
        DEVICE_CONFIDENCE,
        status,
    )
}

/// Score location plausibility.
///
/// No geofencing or velocity analysis is performed: a present fix scores a
/// fixed plausible value.
pub fn score_location(location: Option<&LocationFix>, simulation: &SimulationFlags) -> FactorScore {
    if simulation.impossible_travel() {
        return FactorScore::new(
            FactorKind::Location,
            IMPOSSIBLE_TRAVEL_SCORE,
            SIMULATION_CONFIDENCE,
            FactorStatus::ImpossibleTravel,
        );
    }

    match location {
        None => FactorScore::new(FactorKind::Location, 70, 50, FactorStatus::Unknown),
        Some(_) => FactorScore::new(FactorKind::Location, 85, 75, FactorStatus::Expected),
    }
}

/// Score the local hour of the evaluation
pub fn score_time_of_day<T: Timelike>(local_time: &T) -> FactorScore {
    score_hour(local_time.hour())
}

/// Score a local hour (0-23)
pub fn score_hour(hour: u32) -> FactorScore {
    let (score, status) = match hour {
        6..=22 => (100, FactorStatus::NormalHours),
        23 | 0 | 1 => (80, FactorStatus::LateNight),
        _ => (60, FactorStatus::UnusualTime),
    };

    FactorScore::new(FactorKind::Time, score, TIME_CONFIDENCE, status)
}
