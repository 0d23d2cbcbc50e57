//! Tally configuration
//!
//! Settings that shape window construction and output. Loaded from JSON;
//! every field has a default so partial files are accepted.

use crate::error::TallyError;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of past days reachable from today
pub const DEFAULT_LOOKBACK_LIMIT: i32 = 9;

/// Default UTC offset for local midnight
pub const DEFAULT_UTC_OFFSET: &str = "+00:00";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    /// Guard for `previous()`: stepping back is allowed while the current
    /// index is `>= -lookback_limit`
    pub lookback_limit: i32,
    /// Offset used to find local midnight, `+HH:MM` / `-HH:MM` / `Z`
    pub utc_offset: String,
    /// Keep zero-duration categories in rendered output
    pub include_zero: bool,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            lookback_limit: DEFAULT_LOOKBACK_LIMIT,
            utc_offset: DEFAULT_UTC_OFFSET.to_string(),
            include_zero: true,
        }
    }
}

impl TallyConfig {
    pub fn from_json(json: &str) -> Result<Self, TallyError> {
        let config: TallyConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, TallyError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            TallyError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, TallyError> {
        serde_json::to_string_pretty(self).map_err(TallyError::JsonError)
    }

    /// Check field ranges and that the offset parses
    pub fn validate(&self) -> Result<(), TallyError> {
        if self.lookback_limit < 0 {
            return Err(TallyError::InvalidConfig(format!(
                "lookback_limit must be >= 0, got {}",
                self.lookback_limit
            )));
        }
        self.offset()?;
        Ok(())
    }

    /// Parsed UTC offset
    pub fn offset(&self) -> Result<FixedOffset, TallyError> {
        parse_utc_offset(&self.utc_offset)
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HHMM`, `+HH` or `Z` into a [`FixedOffset`]
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset, TallyError> {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| TallyError::InvalidTimezone(s.to_string()));
    }

    let invalid = || TallyError::InvalidTimezone(s.to_string());

    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1, &trimmed[1..]),
        Some('-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().map_err(|_| invalid())?, 0),
        4 => (
            digits[..2].parse::<i32>().map_err(|_| invalid())?,
            digits[2..].parse::<i32>().map_err(|_| invalid())?,
        ),
        _ => return Err(invalid()),
    };

    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
