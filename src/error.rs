//! Error type for the edges of the track engine.
//!
//! The geometric algorithms never fail: bad pings are skipped and degenerate
//! geometry resolves to neutral values. Errors only surface where the engine
//! touches the outside world (config files, JSON ingest, export writers,
//! background workers) or where a caller hands the playback controller a value
//! it cannot honour.

use thiserror::Error;

/// Unified error type for track-engine operations.
#[derive(Debug, Error)]
pub enum TrackError {
    /// A configuration value is outside its accepted range
    #[error("invalid config value for `{field}`: {message}")]
    InvalidConfig { field: &'static str, message: String },

    /// Playback speed must be a positive, finite multiplier
    #[error("playback speed multiplier must be positive and finite, got {0}")]
    InvalidSpeedMultiplier(f64),

    /// A position record carried a timestamp that could not be parsed
    #[error("ping {id} has an unparseable timestamp `{value}`")]
    InvalidTimestamp { id: i64, value: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background computation panicked or was cancelled
    #[error("background worker failed: {0}")]
    Worker(String),
}

/// Result type alias for track-engine operations.
pub type Result<T> = std::result::Result<T, TrackError>;

impl TrackError {
    pub(crate) fn config(field: &'static str, message: impl Into<String>) -> Self {
        TrackError::InvalidConfig {
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackError::config("heatmap.intensity_multiplier", "must be within [1.25, 5]");
        assert!(err.to_string().contains("heatmap.intensity_multiplier"));
        assert!(err.to_string().contains("[1.25, 5]"));
    }

    #[test]
    fn test_json_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: TrackError = parse.unwrap_err().into();
        assert!(matches!(err, TrackError::Json(_)));
    }

    #[test]
    fn test_timestamp_error_names_record() {
        let err = TrackError::InvalidTimestamp {
            id: 42,
            value: "yesterday".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("42"));
        assert!(text.contains("yesterday"));
    }
}
