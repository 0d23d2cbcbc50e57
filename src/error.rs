//! Error types for activity-tally

use thiserror::Error;

/// Errors that can occur while loading readings or building windows
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("Failed to parse readings: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Activity source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
