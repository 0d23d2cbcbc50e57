//! Tally pipeline orchestration
//!
//! One-shot entry points from reading JSON to a report:
//! parse → convert → window → aggregate → encode.

use crate::aggregator::{DaySummary, DurationAggregator};
use crate::config::TallyConfig;
use crate::error::TallyError;
use crate::report::ReportEncoder;
use crate::schema::{ReadingAdapter, ReadingEvent};
use crate::window::{day_window, ensure_past_or_today};
use chrono::{DateTime, Utc};

/// Parse readings from either a JSON array or NDJSON.
///
/// Input whose first non-blank character is `[` is read as an array.
pub fn parse_readings(input: &str) -> Result<Vec<ReadingEvent>, TallyError> {
    if input.trim_start().starts_with('[') {
        ReadingAdapter::parse_array(input)
    } else {
        ReadingAdapter::parse_ndjson(input)
    }
}

/// Summarize readings for day offset `window_index` relative to `now`
pub fn summarize(
    events: &[ReadingEvent],
    window_index: i32,
    now: DateTime<Utc>,
    config: &TallyConfig,
) -> Result<DaySummary, TallyError> {
    ensure_past_or_today(window_index)?;
    let window = day_window(window_index, now, config.offset()?)?;
    let readings = ReadingAdapter::to_readings(events);
    Ok(DurationAggregator::quantify_window(&readings, &window))
}

/// Convert reading JSON to a report JSON string (stateless, one-shot).
///
/// # Arguments
/// * `readings_json` - readings as JSON array or NDJSON
/// * `window_index` - day offset, 0 = today
/// * `now` - reference instant for today's window
/// * `config` - offset and output settings
pub fn quantify_json(
    readings_json: &str,
    window_index: i32,
    now: DateTime<Utc>,
    config: &TallyConfig,
) -> Result<String, TallyError> {
    config.validate()?;

    // Stage 1: Parse reading records
    let events = parse_readings(readings_json)?;

    // Stage 2: Build the window and aggregate
    let summary = summarize(&events, window_index, now, config)?;

    // Stage 3: Encode
    ReportEncoder::new()
        .include_zero(config.include_zero)
        .encode_to_json(&summary)
}
