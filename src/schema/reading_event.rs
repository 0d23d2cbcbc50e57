//! activity.reading.v1 record definition

use crate::types::{Category, Reading};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

/// Current schema version
pub const SCHEMA_VERSION: &str = "activity.reading.v1";

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// A single activity transition as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingEvent {
    /// Schema version, defaults to the current one when absent
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Optional producer-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// When the transition was observed
    pub timestamp: DateTime<Utc>,
    /// Category name; snake_case, PascalCase and lowercase are accepted
    pub category: String,
}

impl ReadingEvent {
    /// Create a record with a fresh event id
    pub fn new(category: Category, timestamp: DateTime<Utc>) -> Self {
        ReadingEvent {
            schema_version: SCHEMA_VERSION.to_string(),
            event_id: Some(uuid::Uuid::new_v4().to_string()),
            timestamp,
            category: category.as_str().to_string(),
        }
    }

    /// Parsed category, `None` if the name is outside the closed set
    pub fn category(&self) -> Option<Category> {
        Category::parse(&self.category)
    }

    /// Convert to a core reading. Unrecognized categories become
    /// [`Category::Unknown`].
    pub fn to_reading(&self) -> Reading {
        let category = self.category().unwrap_or_else(|| {
            warn!(
                "unrecognized category {:?} at {}, counting as unknown",
                self.category, self.timestamp
            );
            Category::Unknown
        });
        Reading::new(category, self.timestamp)
    }

    /// Validate the record on its own (ordering is checked by the adapter)
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        if self.category().is_none() {
            return Err(ValidationError::UnknownCategory(self.category.clone()));
        }

        Ok(())
    }
}

impl From<&Reading> for ReadingEvent {
    fn from(reading: &Reading) -> Self {
        ReadingEvent {
            schema_version: SCHEMA_VERSION.to_string(),
            event_id: None,
            timestamp: reading.timestamp,
            category: reading.category.as_str().to_string(),
        }
    }
}

/// Validation errors for reading records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Timestamp {timestamp} is earlier than previous reading at {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
}
