//! Signal trace replay
//!
//! A trace is a newline-delimited JSON stream of `TraceEvent` records, one
//! per sampled signal or host action. Replaying a trace against a session
//! yields one `EvaluationRecord` per `evaluate` record, which makes recorded
//! sessions reproducible offline.
//!
//! ```text
//! {"type":"baseline","mean_interval_ms":200.0,"variance":500.0}
//! {"type":"keystroke","at_ms":1000}
//! {"type":"motion","x":0.1,"y":0.2,"z":9.8,"at_ms":1010}
//! {"type":"evaluate","at":"2024-01-15T14:00:00+01:00"}
//! ```

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TrustError;
use crate::session::TrustSession;
use crate::simulation::SimulatedAttack;
use crate::types::{DeviceIntegrity, LocationFix, SecurityAction, TrustScore, TypingBaseline};

/// One record of a signal trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Character appended to a monitored field
    Keystroke { at_ms: u64 },
    /// Character removed; ends the continuous typing session
    Deletion,
    /// New length of a monitored field
    TextChange { len: usize, at_ms: u64 },
    /// Accelerometer sample in m/s²
    Motion { x: f64, y: f64, z: f64, at_ms: u64 },
    /// Location fix; omit coordinates to clear it
    Location {
        #[serde(default)]
        latitude: Option<f64>,
        #[serde(default)]
        longitude: Option<f64>,
        #[serde(default)]
        accuracy_m: Option<f64>,
    },
    /// Device integrity snapshot
    Device(DeviceIntegrity),
    LoginFailure,
    /// Correct credentials; ignored for scoring while failures are at the cap
    LoginSuccess,
    /// Credential text to screen for injection
    Credentials { input: String },
    /// Explicit baseline
    Baseline {
        mean_interval_ms: f64,
        variance: f64,
        #[serde(default)]
        pressure_samples: Vec<f32>,
    },
    /// Promote the current typing window to the baseline
    EstablishBaseline,
    Simulate { attack: SimulatedAttack },
    ClearSimulations,
    /// Full reset, baseline included
    Reset,
    /// Clear signals and login state, keeping the baseline
    ResetSignals,
    /// Evaluate at the given local time
    Evaluate { at: DateTime<FixedOffset> },
}

/// Output of an `evaluate` trace record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub session_id: Uuid,
    pub at: DateTime<FixedOffset>,
    pub action: SecurityAction,
    pub trust: TrustScore,
}

impl TraceEvent {
    /// Parse an NDJSON trace, skipping blank lines
    pub fn parse_ndjson(input: &str) -> Result<Vec<TraceEvent>, TrustError> {
        input
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line.trim())
                    .map_err(|e| TrustError::ParseError(format!("line {}: {}", index + 1, e)))
            })
            .collect()
    }

    /// Parse a JSON array of trace records
    pub fn parse_array(input: &str) -> Result<Vec<TraceEvent>, TrustError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Apply this record to `session`, returning a record for `evaluate`
    pub fn apply(&self, session: &mut TrustSession) -> Result<Option<EvaluationRecord>, TrustError> {
        match self {
            TraceEvent::Keystroke { at_ms } => {
                session.record_keystroke(*at_ms)?;
            }
            TraceEvent::Deletion => session.record_deletion(),
            TraceEvent::TextChange { len, at_ms } => {
                session.on_text_changed(*len, *at_ms)?;
            }
            TraceEvent::Motion { x, y, z, at_ms } => {
                session.record_motion_sample(*x, *y, *z, *at_ms)?;
            }
            TraceEvent::Location {
                latitude,
                longitude,
                accuracy_m,
            } => {
                let fix = match (latitude, longitude) {
                    (Some(lat), Some(lon)) => {
                        let fix = LocationFix::new(*lat, *lon)?;
                        Some(match accuracy_m {
                            Some(accuracy) => fix.with_accuracy(*accuracy)?,
                            None => fix,
                        })
                    }
                    (None, None) => None,
                    _ => {
                        return Err(TrustError::InvalidInput(
                            "location needs both latitude and longitude".to_string(),
                        ))
                    }
                };
                session.set_location(fix)?;
            }
            TraceEvent::Device(device) => session.set_device_integrity(device.clone()),
            TraceEvent::LoginFailure => {
                session.record_login_failure();
            }
            TraceEvent::LoginSuccess => {
                session.record_login_success();
            }
            TraceEvent::Credentials { input } => {
                session.screen_credentials(input);
            }
            TraceEvent::Baseline {
                mean_interval_ms,
                variance,
                pressure_samples,
            } => {
                let baseline = TypingBaseline::new(*mean_interval_ms, *variance)?
                    .with_pressure_samples(pressure_samples.clone());
                session.set_baseline(baseline);
            }
            TraceEvent::EstablishBaseline => {
                if !session.establish_baseline_from_window() {
                    log::warn!("establish_baseline ignored: no typing intervals captured");
                }
            }
            TraceEvent::Simulate { attack } => session.simulate(*attack),
            TraceEvent::ClearSimulations => session.clear_simulations(),
            TraceEvent::Reset => session.reset_session(),
            TraceEvent::ResetSignals => session.reset_signals(),
            TraceEvent::Evaluate { at } => {
                let trust = session.evaluate(*at);
                return Ok(Some(EvaluationRecord {
                    session_id: session.id(),
                    at: *at,
                    action: trust.action(),
                    trust,
                }));
            }
        }
        Ok(None)
    }
}

/// Replay `events` in order, collecting every evaluation
pub fn replay(
    session: &mut TrustSession,
    events: &[TraceEvent],
) -> Result<Vec<EvaluationRecord>, TrustError> {
    let mut records = Vec::new();
    for event in events {
        if let Some(record) = event.apply(session)? {
            records.push(record);
        }
    }
    Ok(records)
}
