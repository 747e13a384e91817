//! Error types for the trust engine

use thiserror::Error;

/// Errors raised at the input boundary of the engine.
///
/// Scoring itself never fails; missing signals degrade to neutral factor
/// scores instead of producing an error.
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Clock went backwards: previous sample at {previous_ms}ms, new sample at {now_ms}ms")]
    NegativeInterval { previous_ms: u64, now_ms: u64 },

    #[error("Coordinates out of range: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Non-finite sample: {0}")]
    NonFiniteSample(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse trace record: {0}")]
    ParseError(String),

    #[error("Session lock poisoned")]
    SessionLocked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = TrustError::NegativeInterval {
            previous_ms: 2_000,
            now_ms: 1_500,
        };
        assert_eq!(
            err.to_string(),
            "Clock went backwards: previous sample at 2000ms, new sample at 1500ms"
        );

        let err = TrustError::InvalidCoordinates {
            latitude: 91.0,
            longitude: 0.0,
        };
        assert!(err.to_string().contains("latitude 91"));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: TrustError = parse.unwrap_err().into();
        assert!(matches!(err, TrustError::JsonError(_)));
    }
}
