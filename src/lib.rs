//! activity-tally - per-category activity durations over day windows
//!
//! Reduces a sparse, timestamped log of activity transitions (Idle, Walking,
//! Running, ...) into cumulative durations per category for a selectable
//! day window: parse → window → aggregate → encode.
//!
//! ## Modules
//!
//! - **Aggregation**: boundary synthesis and per-category totals ([`DurationAggregator`])
//! - **Windows**: day-offset navigation and `[start, end)` construction ([`WindowSelector`])
//! - **Tracker**: caller-owned wiring to a sensing collaborator ([`ActivityTracker`])

pub mod aggregator;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod tracker;
pub mod types;
pub mod window;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregator::{DaySummary, DurationAggregator};
pub use config::TallyConfig;
pub use error::TallyError;
pub use pipeline::quantify_json;
pub use tracker::{ActivityObserver, ActivitySource, ActivityTracker, ReadingLog, SourceState};
pub use types::{Category, QuantifiedResult, Reading, Window};
pub use window::{day_window, WindowSelector};

// Schema exports
pub use schema::{ReadingAdapter, ReadingEvent, SCHEMA_VERSION};

/// Library version embedded in all reports
pub const TALLY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "activity-tally";
