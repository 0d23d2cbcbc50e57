//! Duration aggregation
//!
//! Turns a window's reading history into per-category totals. Each reading
//! lasts until the next one; synthetic readings are placed at the window
//! edges so the activities that straddle them are measured up to the edge.

use crate::types::{Category, QuantifiedResult, Reading, Window};
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Aggregator for per-category durations
pub struct DurationAggregator;

impl DurationAggregator {
    /// Compute one result per category, in enumeration order.
    ///
    /// `readings` are expected in ascending timestamp order. Intervals that
    /// run backwards count as zero; intervals reaching outside
    /// `[start, end)` only count their overlap with it, and time already
    /// attributed to an earlier interval is not counted again.
    pub fn quantify(
        readings: &[Reading],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<QuantifiedResult> {
        let totals = accumulate(readings, start, end);

        Category::ALL
            .iter()
            .map(|&category| QuantifiedResult::new(category, totals[category.index()]))
            .collect()
    }

    /// Quantify a window and attach tracked/untracked totals
    pub fn quantify_window(readings: &[Reading], window: &Window) -> DaySummary {
        let results = Self::quantify(readings, window.start, window.end);
        DaySummary::new(*window, results)
    }
}

/// Per-category totals indexed by [`Category::index`]
fn accumulate(
    readings: &[Reading],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> [Duration; Category::COUNT] {
    let mut totals = [Duration::zero(); Category::COUNT];

    // No data at all for this window, e.g. the device was off
    let Some(first) = readings.first().copied() else {
        return totals;
    };

    let mut timeline: Vec<Reading> = Vec::with_capacity(readings.len() + 1);
    timeline.extend_from_slice(readings);

    // A first reading at or before the window start is the activity carried
    // over from the previous window; only its part after `start` counts.
    if first.timestamp <= start {
        timeline[0] = Reading::new(first.category, start);
        debug!(
            "pinned carried-over {} reading from {} to window start {}",
            first.category, first.timestamp, start
        );
    }

    // A lone reading from a previous window says nothing about this one.
    // A lone reading exactly at `start` does belong to it.
    let has_data_in_window = timeline.len() > 1 || first.timestamp >= start;
    if !has_data_in_window {
        return totals;
    }

    if let Some(last) = timeline.last().copied() {
        if last.timestamp < end {
            timeline.push(Reading::new(last.category, end));
        }
    }

    let mut out_of_order = 0usize;
    // Time before this mark is already attributed
    let mut covered_until = start;
    for pair in timeline.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        if next.timestamp < current.timestamp {
            // Earlier-window readings after the pinned start are just over-fetch
            if next.timestamp > start {
                out_of_order += 1;
            }
            continue;
        }

        let from = current.timestamp.max(covered_until);
        let to = next.timestamp.min(end);
        if to > from {
            totals[current.category.index()] += to - from;
            covered_until = to;
        }
    }

    if out_of_order > 0 {
        warn!(
            "{} reading(s) out of timestamp order in window [{}, {}); their intervals count as zero",
            out_of_order, start, end
        );
    }

    totals
}

/// Results for one window plus coverage totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub window: Window,
    /// One entry per category, enumeration order
    pub results: Vec<QuantifiedResult>,
    /// Sum of all category durations
    #[serde(rename = "tracked_sec", with = "crate::types::duration_secs")]
    pub tracked: Duration,
    /// Window time not attributed to any category
    #[serde(rename = "untracked_sec", with = "crate::types::duration_secs")]
    pub untracked: Duration,
}

impl DaySummary {
    pub fn new(window: Window, results: Vec<QuantifiedResult>) -> Self {
        let tracked = results
            .iter()
            .fold(Duration::zero(), |acc, r| acc + r.duration);
        let untracked = (window.length() - tracked).max(Duration::zero());

        Self {
            window,
            results,
            tracked,
            untracked,
        }
    }

    /// Duration recorded for `category`
    pub fn duration_of(&self, category: Category) -> Duration {
        self.results
            .iter()
            .find(|r| r.category == category)
            .map(|r| r.duration)
            .unwrap_or_else(Duration::zero)
    }

    /// Category with the largest non-zero duration.
    ///
    /// Ties go to the category earlier in enumeration order.
    pub fn dominant(&self) -> Option<Category> {
        self.results
            .iter()
            .filter(|r| !r.is_zero())
            .fold(None::<&QuantifiedResult>, |best, r| match best {
                Some(b) if b.duration >= r.duration => Some(b),
                _ => Some(r),
            })
            .map(|r| r.category)
    }

    /// Results with zero-duration categories removed
    pub fn non_zero(&self) -> impl Iterator<Item = &QuantifiedResult> {
        self.results.iter().filter(|r| !r.is_zero())
    }
}
