//! activity.reading.v1 schema
//!
//! Wire format for reading histories handed to the tally: one JSON object
//! per activity transition, as NDJSON or a JSON array.

mod adapter;
mod reading_event;

pub use adapter::*;
pub use reading_event::*;
