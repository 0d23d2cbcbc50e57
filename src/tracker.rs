//! Activity tracker
//!
//! Caller-owned wiring between the sensing collaborator, the window selector
//! and the aggregator. Every window change triggers a fresh fetch followed by
//! a full recompute; results are handed to an observer supplied by the caller.

use crate::aggregator::{DaySummary, DurationAggregator};
use crate::config::TallyConfig;
use crate::error::TallyError;
use crate::types::{Category, Reading, Window};
use crate::window::WindowSelector;
use chrono::{DateTime, FixedOffset, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// External activity-sensing capability
pub trait ActivitySource {
    /// Readings for `window` in ascending timestamp order.
    ///
    /// The first entry may predate `window.start` (the activity carried over
    /// from the previous window). An empty history is valid.
    fn fetch_history(&mut self, window: &Window) -> Result<Vec<Reading>, TallyError>;

    /// Latest live reading, if any
    fn current_reading(&mut self) -> Result<Option<Reading>, TallyError>;

    fn activate(&mut self) -> Result<(), TallyError> {
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), TallyError> {
        Ok(())
    }
}

/// Receiver for tracker notifications. All methods default to no-ops.
pub trait ActivityObserver {
    /// The live activity changed
    fn on_category_changed(&mut self, _category: Category) {}

    /// The selected day offset changed
    fn on_window_changed(&mut self, _index: i32) {}

    /// Results were recomputed
    fn on_results(&mut self, _summary: &DaySummary) {}
}

impl ActivityObserver for () {}

/// Lifecycle of the sensing collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Active,
    Inactive,
}

impl SourceState {
    /// State after a visibility event, `None` if nothing changes
    pub fn on_visibility(self, visible: bool) -> Option<SourceState> {
        match (self, visible) {
            (SourceState::Inactive, true) => Some(SourceState::Active),
            (SourceState::Active, false) => Some(SourceState::Inactive),
            _ => None,
        }
    }
}

pub struct ActivityTracker<S: ActivitySource, O: ActivityObserver = ()> {
    source: S,
    observer: O,
    selector: WindowSelector,
    offset: FixedOffset,
    state: SourceState,
    current: Category,
    summary: Option<DaySummary>,
}

impl<S: ActivitySource, O: ActivityObserver> ActivityTracker<S, O> {
    pub fn new(source: S, observer: O, config: &TallyConfig) -> Result<Self, TallyError> {
        config.validate()?;
        Ok(Self {
            source,
            observer,
            selector: WindowSelector::new(config.lookback_limit),
            offset: config.offset()?,
            state: SourceState::Inactive,
            current: Category::Idle,
            summary: None,
        })
    }

    /// Activate the source, pick up the live activity and compute today's results
    pub fn initialize(&mut self, now: DateTime<Utc>) -> Result<&DaySummary, TallyError> {
        self.set_visible(true)?;
        if let Some(reading) = self.source.current_reading()? {
            self.handle_reading_changed(reading);
        }
        self.refresh(now)
    }

    /// Feed a live activity-change notification from the source
    pub fn handle_reading_changed(&mut self, reading: Reading) {
        if reading.category != self.current {
            debug!("current activity {} -> {}", self.current, reading.category);
            self.current = reading.category;
            self.observer.on_category_changed(reading.category);
        }
    }

    /// Apply a visibility change to the source lifecycle.
    ///
    /// Returns the new state when a transition happened.
    pub fn set_visible(&mut self, visible: bool) -> Result<Option<SourceState>, TallyError> {
        let Some(next) = self.state.on_visibility(visible) else {
            return Ok(None);
        };

        match next {
            SourceState::Active => self.source.activate()?,
            SourceState::Inactive => self.source.deactivate()?,
        }
        info!("activity source {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(Some(next))
    }

    /// Step one day back and recompute. `None` when already at the limit.
    pub fn previous_day(&mut self, now: DateTime<Utc>) -> Result<Option<i32>, TallyError> {
        let before = self.selector;
        let changed = self.selector.previous();
        self.after_navigation(before, changed, now)
    }

    /// Step one day forward and recompute. `None` when already at today.
    pub fn next_day(&mut self, now: DateTime<Utc>) -> Result<Option<i32>, TallyError> {
        let before = self.selector;
        let changed = self.selector.next();
        self.after_navigation(before, changed, now)
    }

    /// Jump to today and recompute
    pub fn today(&mut self, now: DateTime<Utc>) -> Result<Option<i32>, TallyError> {
        let before = self.selector;
        let changed = self.selector.reset();
        self.after_navigation(before, changed, now)
    }

    /// Recompute for the new index; on failure the selector and the last
    /// summary stay on the previous window.
    fn after_navigation(
        &mut self,
        before: WindowSelector,
        changed: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<Option<i32>, TallyError> {
        let Some(index) = changed else {
            return Ok(None);
        };

        if let Err(e) = self.refresh(now).map(|_| ()) {
            warn!(
                "refresh of window {} failed, staying on {}: {}",
                index,
                before.current(),
                e
            );
            self.selector = before;
            return Err(e);
        }

        self.observer.on_window_changed(index);
        Ok(Some(index))
    }

    /// Fetch the selected window's history and recompute all results.
    ///
    /// The previous summary is replaced wholesale.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> Result<&DaySummary, TallyError> {
        let window = self.selector.window(now, self.offset)?;
        let readings = self.source.fetch_history(&window)?;
        debug!(
            "window {} [{}, {}): {} reading(s)",
            window.index,
            window.start,
            window.end,
            readings.len()
        );

        let summary = DurationAggregator::quantify_window(&readings, &window);
        self.observer.on_results(&summary);
        Ok(&*self.summary.insert(summary))
    }

    /// Lowercase name of the live activity, e.g. `"walking"`
    pub fn current_activity(&self) -> String {
        self.current.current_activity_label()
    }

    pub fn current_category(&self) -> Category {
        self.current
    }

    pub fn window_index(&self) -> i32 {
        self.selector.current()
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    /// Most recent results, `None` before the first refresh
    pub fn summary(&self) -> Option<&DaySummary> {
        self.summary.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }
}

/// In-memory reading history that answers window queries like the
/// sensing capability does.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadingLog {
    readings: Vec<Reading>,
    #[serde(skip)]
    active: bool,
}

impl ReadingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from readings in any order
    pub fn from_readings(mut readings: Vec<Reading>) -> Self {
        readings.sort_by_key(|r| r.timestamp);
        Self {
            readings,
            active: false,
        }
    }

    /// Insert a reading, keeping timestamp order.
    ///
    /// Readings with equal timestamps keep insertion order.
    pub fn record(&mut self, reading: Reading) {
        let pos = self
            .readings
            .partition_point(|r| r.timestamp <= reading.timestamp);
        self.readings.insert(pos, reading);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Readings inside `[start, end)` preceded by the last reading before
    /// `start`, if there is one
    pub fn history_for(&self, window: &Window) -> Vec<Reading> {
        let first_in = self.readings.partition_point(|r| r.timestamp < window.start);
        let end = self.readings.partition_point(|r| r.timestamp < window.end);
        let begin = first_in.saturating_sub(1);

        self.readings[begin..end.max(begin)].to_vec()
    }
}

impl ActivitySource for ReadingLog {
    fn fetch_history(&mut self, window: &Window) -> Result<Vec<Reading>, TallyError> {
        Ok(self.history_for(window))
    }

    fn current_reading(&mut self) -> Result<Option<Reading>, TallyError> {
        if !self.active {
            return Err(TallyError::SourceUnavailable(
                "reading log is not active".to_string(),
            ));
        }
        Ok(self.readings.last().copied())
    }

    fn activate(&mut self) -> Result<(), TallyError> {
        self.active = true;
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), TallyError> {
        self.active = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, h, m, 0).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        categories: Vec<Category>,
        windows: Vec<i32>,
        results: usize,
    }

    impl ActivityObserver for Recorder {
        fn on_category_changed(&mut self, category: Category) {
            self.categories.push(category);
        }

        fn on_window_changed(&mut self, index: i32) {
            self.windows.push(index);
        }

        fn on_results(&mut self, _summary: &DaySummary) {
            self.results += 1;
        }
    }

    fn sample_log() -> ReadingLog {
        ReadingLog::from_readings(vec![
            Reading::new(Category::Walking, at(15, 8, 0)),
            Reading::new(Category::Idle, at(14, 22, 0)),
            Reading::new(Category::Idle, at(15, 8, 30)),
            Reading::new(Category::Walking, at(15, 9, 0)),
            Reading::new(Category::Running, at(14, 18, 0)),
        ])
    }

    fn tracker() -> ActivityTracker<ReadingLog, Recorder> {
        ActivityTracker::new(sample_log(), Recorder::default(), &TallyConfig::default()).unwrap()
    }

    #[test]
    fn test_source_state_transitions() {
        assert_eq!(SourceState::Inactive.on_visibility(true), Some(SourceState::Active));
        assert_eq!(SourceState::Active.on_visibility(false), Some(SourceState::Inactive));
        assert_eq!(SourceState::Active.on_visibility(true), None);
        assert_eq!(SourceState::Inactive.on_visibility(false), None);
    }

    #[test]
    fn test_history_includes_carried_over_reading() {
        let log = sample_log();
        let window = Window {
            index: 0,
            start: at(15, 0, 0),
            end: at(15, 10, 0),
        };

        let history = log.history_for(&window);
        let categories: Vec<Category> = history.iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            vec![Category::Idle, Category::Walking, Category::Idle, Category::Walking]
        );
        assert_eq!(history[0].timestamp, at(14, 22, 0));
    }

    #[test]
    fn test_history_for_empty_window() {
        let log = ReadingLog::new();
        let window = Window {
            index: -1,
            start: at(14, 0, 0),
            end: at(15, 0, 0),
        };
        assert!(log.history_for(&window).is_empty());

        // Before any reading exists
        let early = Window {
            index: -5,
            start: at(10, 0, 0),
            end: at(11, 0, 0),
        };
        assert!(sample_log().history_for(&early).is_empty());
    }

    #[test]
    fn test_record_keeps_order() {
        let mut log = ReadingLog::new();
        log.record(Reading::new(Category::Walking, at(15, 9, 0)));
        log.record(Reading::new(Category::Idle, at(15, 8, 0)));
        log.record(Reading::new(Category::Running, at(15, 9, 0)));

        let categories: Vec<Category> = log.readings().iter().map(|r| r.category).collect();
        assert_eq!(categories, vec![Category::Idle, Category::Walking, Category::Running]);
    }

    #[test]
    fn test_initialize_computes_today() {
        let mut tracker = tracker();
        let now = at(15, 10, 0);

        let summary = tracker.initialize(now).unwrap().clone();

        assert_eq!(tracker.state(), SourceState::Active);
        assert_eq!(tracker.current_category(), Category::Walking);
        assert_eq!(tracker.current_activity(), "walking");
        assert_eq!(summary.window.index, 0);
        // Idle carried over from 22:00 yesterday counts from midnight to 08:00
        assert_eq!(summary.duration_of(Category::Idle), Duration::hours(8) + Duration::minutes(30));
        assert_eq!(summary.duration_of(Category::Walking), Duration::minutes(90));
        assert_eq!(summary.tracked, Duration::hours(10));
        assert_eq!(tracker.observer().results, 1);
        assert_eq!(tracker.observer().categories, vec![Category::Walking]);
    }

    #[test]
    fn test_navigation_refetches_and_notifies() {
        let mut tracker = tracker();
        let now = at(15, 10, 0);
        tracker.initialize(now).unwrap();

        assert_eq!(tracker.previous_day(now).unwrap(), Some(-1));
        let summary = tracker.summary().unwrap();
        assert_eq!(summary.window.index, -1);
        // Running from 18:00 to 22:00, Idle from 22:00 to midnight
        assert_eq!(summary.duration_of(Category::Running), Duration::hours(4));
        assert_eq!(summary.duration_of(Category::Idle), Duration::hours(2));

        assert_eq!(tracker.next_day(now).unwrap(), Some(0));
        assert_eq!(tracker.next_day(now).unwrap(), None);
        assert_eq!(tracker.observer().windows, vec![-1, 0]);
        assert_eq!(tracker.observer().results, 3);
    }

    #[test]
    fn test_navigation_stops_at_lookback() {
        let mut tracker = tracker();
        let now = at(15, 10, 0);

        let mut last = None;
        while let Some(index) = tracker.previous_day(now).unwrap() {
            last = Some(index);
        }
        assert_eq!(last, Some(-10));
        assert_eq!(tracker.window_index(), -10);
        assert_eq!(tracker.observer().windows.len(), 10);

        let summary = tracker.summary().unwrap();
        assert!(summary.results.iter().all(|r| r.is_zero()));

        assert_eq!(tracker.today(now).unwrap(), Some(0));
        assert_eq!(tracker.today(now).unwrap(), None);
    }

    struct FlakySource {
        log: ReadingLog,
        fail: bool,
    }

    impl ActivitySource for FlakySource {
        fn fetch_history(&mut self, window: &Window) -> Result<Vec<Reading>, TallyError> {
            if self.fail {
                return Err(TallyError::SourceUnavailable("history store offline".to_string()));
            }
            self.log.fetch_history(window)
        }

        fn current_reading(&mut self) -> Result<Option<Reading>, TallyError> {
            Ok(None)
        }
    }

    #[test]
    fn test_failed_navigation_keeps_previous_window() {
        let source = FlakySource {
            log: sample_log(),
            fail: false,
        };
        let mut tracker =
            ActivityTracker::new(source, Recorder::default(), &TallyConfig::default()).unwrap();
        let now = at(15, 10, 0);
        tracker.initialize(now).unwrap();

        tracker.source_mut().fail = true;
        assert!(matches!(
            tracker.previous_day(now),
            Err(TallyError::SourceUnavailable(_))
        ));

        assert_eq!(tracker.window_index(), 0);
        assert_eq!(tracker.summary().unwrap().window.index, 0);
        assert!(tracker.observer().windows.is_empty());

        tracker.source_mut().fail = false;
        assert_eq!(tracker.previous_day(now).unwrap(), Some(-1));
        assert_eq!(tracker.summary().unwrap().window.index, -1);
        assert_eq!(tracker.observer().windows, vec![-1]);
    }

    #[test]
    fn test_live_reading_changes_notify_once() {
        let mut tracker = tracker();
        tracker.handle_reading_changed(Reading::new(Category::Idle, at(15, 9, 0)));
        tracker.handle_reading_changed(Reading::new(Category::Biking, at(15, 9, 5)));
        tracker.handle_reading_changed(Reading::new(Category::Biking, at(15, 9, 6)));

        assert_eq!(tracker.observer().categories, vec![Category::Biking]);
        assert_eq!(tracker.current_activity(), "biking");
    }

    #[test]
    fn test_visibility_drives_source() {
        let mut tracker = tracker();
        assert_eq!(tracker.set_visible(true).unwrap(), Some(SourceState::Active));
        assert!(tracker.source().is_active());

        assert_eq!(tracker.set_visible(true).unwrap(), None);
        assert_eq!(tracker.set_visible(false).unwrap(), Some(SourceState::Inactive));
        assert!(!tracker.source().is_active());

        assert!(matches!(
            tracker.source_mut().current_reading(),
            Err(TallyError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TallyConfig {
            utc_offset: "nowhere".to_string(),
            ..TallyConfig::default()
        };
        assert!(ActivityTracker::new(ReadingLog::new(), (), &config).is_err());
    }
}
