//! Day-window selection
//!
//! `WindowSelector` holds the day offset the user is looking at and
//! `day_window` turns an offset into concrete `[start, end)` instants.

use crate::config::DEFAULT_LOOKBACK_LIMIT;
use crate::error::TallyError;
use crate::types::Window;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Day offset navigator, 0 = today, negative = past days.
///
/// Transitions return `Some(new_index)` when the index changed and `None`
/// when the move was out of range (no notification is due).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSelector {
    index: i32,
    lookback_limit: i32,
}

impl Default for WindowSelector {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKBACK_LIMIT)
    }
}

impl WindowSelector {
    /// Create a selector positioned at today.
    ///
    /// Negative limits are treated as 0.
    pub fn new(lookback_limit: i32) -> Self {
        Self {
            index: 0,
            lookback_limit: lookback_limit.max(0),
        }
    }

    pub fn current(&self) -> i32 {
        self.index
    }

    pub fn lookback_limit(&self) -> i32 {
        self.lookback_limit
    }

    /// Lowest index `previous()` can reach.
    ///
    /// The guard checks the index before stepping, so this is one day past
    /// the lookback limit.
    pub fn earliest(&self) -> i32 {
        -self.lookback_limit.saturating_add(1)
    }

    /// Step one day back
    pub fn previous(&mut self) -> Option<i32> {
        if self.index >= -self.lookback_limit {
            self.index -= 1;
            Some(self.index)
        } else {
            None
        }
    }

    /// Step one day forward, never past today
    pub fn next(&mut self) -> Option<i32> {
        if self.index < 0 {
            self.index += 1;
            Some(self.index)
        } else {
            None
        }
    }

    /// Jump back to today
    pub fn reset(&mut self) -> Option<i32> {
        if self.index != 0 {
            self.index = 0;
            Some(self.index)
        } else {
            None
        }
    }

    /// Window for the current index relative to `now`
    pub fn window(&self, now: DateTime<Utc>, offset: FixedOffset) -> Result<Window, TallyError> {
        day_window(self.index, now, offset)
    }
}

/// Local midnight of the day containing `now`, as a UTC instant
pub fn local_midnight(now: DateTime<Utc>, offset: FixedOffset) -> Result<DateTime<Utc>, TallyError> {
    let local_date = now.with_timezone(&offset).date_naive();
    let midnight = local_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| TallyError::InvalidTimestamp(format!("no midnight on {local_date}")))?;

    offset
        .from_local_datetime(&midnight)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| TallyError::InvalidTimezone(offset.to_string()))
}

/// Reject day offsets in the future
pub fn ensure_past_or_today(index: i32) -> Result<(), TallyError> {
    if index > 0 {
        return Err(TallyError::InvalidConfig(format!(
            "window index must be <= 0, got {index}"
        )));
    }
    Ok(())
}

/// Build the window for day offset `index`.
///
/// `start` is local midnight of today shifted by `index` days. `end` is the
/// following midnight, except for `index == 0` where it is `now`.
pub fn day_window(index: i32, now: DateTime<Utc>, offset: FixedOffset) -> Result<Window, TallyError> {
    let today = local_midnight(now, offset)?;
    let start = today
        .checked_add_signed(Duration::days(i64::from(index)))
        .ok_or_else(|| TallyError::InvalidTimestamp(format!("day offset {index} out of range")))?;

    let end = if index == 0 {
        now
    } else {
        start
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| TallyError::InvalidTimestamp(format!("day offset {index} out of range")))?
    };

    Ok(Window { index, start, end })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_starts_at_today() {
        let selector = WindowSelector::default();
        assert_eq!(selector.current(), 0);
        assert_eq!(selector.lookback_limit(), 9);
        assert_eq!(selector.earliest(), -10);
    }

    #[test]
    fn test_previous_reaches_one_past_lookback() {
        let mut selector = WindowSelector::default();

        for expected in 1..=9 {
            assert_eq!(selector.previous(), Some(-expected));
        }
        assert_eq!(selector.current(), -9);

        // Guard checks the pre-decrement index, so -9 may still step back
        assert_eq!(selector.previous(), Some(-10));
        assert_eq!(selector.previous(), None);
        assert_eq!(selector.current(), -10);
    }

    #[test]
    fn test_next_stops_at_today() {
        let mut selector = WindowSelector::default();
        assert_eq!(selector.next(), None);

        selector.previous();
        selector.previous();
        assert_eq!(selector.next(), Some(-1));
        assert_eq!(selector.next(), Some(0));
        assert_eq!(selector.next(), None);
        assert_eq!(selector.current(), 0);
    }

    #[test]
    fn test_custom_lookback() {
        let mut selector = WindowSelector::new(2);
        let reached: Vec<i32> = std::iter::from_fn(|| selector.previous()).collect();
        assert_eq!(reached, vec![-1, -2, -3]);
        assert_eq!(selector.current(), selector.earliest());

        let mut clamped = WindowSelector::new(-4);
        assert_eq!(clamped.lookback_limit(), 0);
        assert_eq!(clamped.previous(), Some(-1));
        assert_eq!(clamped.previous(), None);
    }

    #[test]
    fn test_earliest_saturates_at_max_lookback() {
        let mut selector = WindowSelector::new(i32::MAX);
        assert_eq!(selector.earliest(), -i32::MAX);
        assert_eq!(selector.previous(), Some(-1));
    }

    #[test]
    fn test_future_index_rejected() {
        assert!(ensure_past_or_today(0).is_ok());
        assert!(ensure_past_or_today(-10).is_ok());
        assert!(matches!(
            ensure_past_or_today(1),
            Err(TallyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_reset() {
        let mut selector = WindowSelector::default();
        assert_eq!(selector.reset(), None);
        selector.previous();
        assert_eq!(selector.reset(), Some(0));
        assert_eq!(selector.current(), 0);
    }

    #[test]
    fn test_today_window_ends_now() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let window = day_window(0, now, utc()).unwrap();

        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        assert_eq!(window.end, now);
        assert!(window.is_live());
    }

    #[test]
    fn test_past_window_spans_full_day() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let window = day_window(-3, now, utc()).unwrap();

        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 12, 0, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 1, 13, 0, 0, 0).unwrap());
        assert_eq!(window.length(), Duration::days(1));
    }

    #[test]
    fn test_offset_moves_midnight() {
        // 01:30 UTC is already 03:30 on the same local day at +02:00
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 1, 30, 0).unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let window = day_window(0, now, plus_two).unwrap();
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 14, 22, 0, 0).unwrap());

        // At -05:00 the local day is still Jan 14
        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        let window = day_window(0, now, minus_five).unwrap();
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 14, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_selector_window_follows_index() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let mut selector = WindowSelector::default();
        selector.previous();

        let window = selector.window(now, utc()).unwrap();
        assert_eq!(window.index, -1);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 14, 0, 0, 0).unwrap());
    }
}
