//! Report encoding
//!
//! Wraps a day summary with producer metadata into the JSON report consumed
//! by the presentation layer and the CLI.

use crate::aggregator::DaySummary;
use crate::error::TallyError;
use crate::types::{Category, QuantifiedResult};
use crate::{PRODUCER_NAME, TALLY_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportWindow {
    pub index: i32,
    pub start_utc: String,
    pub end_utc: String,
    pub is_live: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTotals {
    pub tracked_sec: i64,
    pub untracked_sec: i64,
    pub dominant: Option<Category>,
}

/// Complete tally report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub window: ReportWindow,
    pub computed_at_utc: String,
    pub results: Vec<QuantifiedResult>,
    pub totals: ReportTotals,
}

/// Encoder for tally reports
pub struct ReportEncoder {
    instance_id: String,
    include_zero: bool,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            include_zero: true,
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self {
            instance_id,
            include_zero: true,
        }
    }

    /// Drop zero-duration categories from the encoded results
    pub fn include_zero(mut self, include_zero: bool) -> Self {
        self.include_zero = include_zero;
        self
    }

    pub fn encode(&self, summary: &DaySummary) -> TallyReport {
        self.encode_at(summary, Utc::now())
    }

    /// Encode with an explicit computation time
    pub fn encode_at(&self, summary: &DaySummary, computed_at: DateTime<Utc>) -> TallyReport {
        let results = summary
            .results
            .iter()
            .filter(|r| self.include_zero || !r.is_zero())
            .cloned()
            .collect();

        // Totals come from the whole-second rows so they add up on the wire
        let tracked_sec: i64 = summary
            .results
            .iter()
            .map(|r| r.duration.num_seconds())
            .sum();
        let untracked_sec = (summary.window.length().num_seconds() - tracked_sec).max(0);

        TallyReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: TALLY_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            window: ReportWindow {
                index: summary.window.index,
                start_utc: summary.window.start.to_rfc3339(),
                end_utc: summary.window.end.to_rfc3339(),
                is_live: summary.window.is_live(),
            },
            computed_at_utc: computed_at.to_rfc3339(),
            results,
            totals: ReportTotals {
                tracked_sec,
                untracked_sec,
                dominant: summary.dominant(),
            },
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, summary: &DaySummary) -> Result<String, TallyError> {
        let report = self.encode(summary);
        serde_json::to_string_pretty(&report).map_err(TallyError::JsonError)
    }
}

/// Render a duration as `1h 30m`, `45m` or `20s`
pub fn format_duration(duration: chrono::Duration) -> String {
    let secs = duration.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m"),
        _ => format!("{h}h {m:02}m"),
    }
}
