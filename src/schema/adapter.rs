//! Adapter for converting activity.reading.v1 records to core readings

use crate::error::TallyError;
use crate::schema::reading_event::*;
use crate::types::Reading;

/// Adapter for parsing and validating reading records
pub struct ReadingAdapter;

impl ReadingAdapter {
    /// Parse a JSON string containing an array of ReadingEvents
    pub fn parse_array(json: &str) -> Result<Vec<ReadingEvent>, TallyError> {
        let events: Vec<ReadingEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON) containing ReadingEvents
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<ReadingEvent>, TallyError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<ReadingEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(TallyError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Validate every event, including ascending timestamp order.
    ///
    /// Only failures are returned.
    pub fn validate_events(events: &[ReadingEvent]) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        let mut previous = None;

        for (idx, event) in events.iter().enumerate() {
            let error = event.validate().err().or_else(|| match previous {
                Some(prev) if event.timestamp < prev => Some(ValidationError::OutOfOrder {
                    previous: prev,
                    timestamp: event.timestamp,
                }),
                _ => None,
            });

            previous = Some(previous.map_or(event.timestamp, |p| event.timestamp.max(p)));

            if error.is_some() {
                results.push(ValidationResult {
                    index: idx,
                    event_id: event.event_id.clone(),
                    result: error,
                });
            }
        }

        results
    }

    /// Convert events to core readings, keeping their order
    pub fn to_readings(events: &[ReadingEvent]) -> Vec<Reading> {
        events.iter().map(ReadingEvent::to_reading).collect()
    }
}

/// Result of event validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub event_id: Option<String>,
    pub result: Option<ValidationError>,
}
