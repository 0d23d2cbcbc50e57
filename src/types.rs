//! Core types for activity tallies
//!
//! This module defines the data that flows through the tally: activity
//! categories, timestamped readings, day windows and per-category results.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Activity kind reported by the sensing capability.
///
/// Declaration order is the enumeration order used for every result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Unknown,
    Idle,
    Moving,
    Stationary,
    Walking,
    Running,
    Biking,
    MovingInVehicle,
}

impl Category {
    /// Number of categories
    pub const COUNT: usize = 8;

    /// All categories in enumeration order
    pub const ALL: [Category; Category::COUNT] = [
        Category::Unknown,
        Category::Idle,
        Category::Moving,
        Category::Stationary,
        Category::Walking,
        Category::Running,
        Category::Biking,
        Category::MovingInVehicle,
    ];

    /// Position of this category in [`Category::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Wire name (snake_case)
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Unknown => "unknown",
            Category::Idle => "idle",
            Category::Moving => "moving",
            Category::Stationary => "stationary",
            Category::Walking => "walking",
            Category::Running => "running",
            Category::Biking => "biking",
            Category::MovingInVehicle => "moving_in_vehicle",
        }
    }

    /// PascalCase name as reported by the vendor enumeration
    pub fn name(&self) -> &'static str {
        match self {
            Category::Unknown => "Unknown",
            Category::Idle => "Idle",
            Category::Moving => "Moving",
            Category::Stationary => "Stationary",
            Category::Walking => "Walking",
            Category::Running => "Running",
            Category::Biking => "Biking",
            Category::MovingInVehicle => "MovingInVehicle",
        }
    }

    /// Human-readable label, e.g. `"Moving In Vehicle"`
    pub fn display_label(&self) -> String {
        split_words(self.name())
    }

    /// Lowercase name shown in the live "current activity" field
    pub fn current_activity_label(&self) -> String {
        self.name().to_lowercase()
    }

    /// Parse a category from snake_case, PascalCase or lowercase text.
    ///
    /// Returns `None` for names outside the closed set.
    pub fn parse(s: &str) -> Option<Category> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        Category::ALL
            .iter()
            .copied()
            .find(|c| c.name().to_lowercase() == folded)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Insert a space at each word boundary of a PascalCase identifier.
///
/// A boundary is an uppercase letter preceded by a lowercase one, or an
/// uppercase letter followed by a lowercase one inside an uppercase run
/// (`"GPSSignal"` becomes `"GPS Signal"`).
fn split_words(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || (prev.is_alphabetic() && next_is_lower) {
                out.push(' ');
            }
        }
        out.push(c);
    }

    out
}

/// An observed transition into `category` at `timestamp`.
///
/// The reading lasts until the next reading's timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub category: Category,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(category: Category, timestamp: DateTime<Utc>) -> Self {
        Self {
            category,
            timestamp,
        }
    }
}

/// Day window `[start, end)` selected by a day offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Day offset, 0 = today, -1 = yesterday
    pub index: i32,
    /// Local midnight of the selected day (UTC instant)
    pub start: DateTime<Utc>,
    /// Next local midnight, or the reference "now" for today's window
    pub end: DateTime<Utc>,
}

impl Window {
    /// Whether the window is still accumulating (today's window)
    pub fn is_live(&self) -> bool {
        self.index == 0
    }

    /// Window length, zero if `end` precedes `start`
    pub fn length(&self) -> Duration {
        (self.end - self.start).max(Duration::zero())
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        *timestamp >= self.start && *timestamp < self.end
    }
}

/// Total time spent in one category over a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantifiedResult {
    pub category: Category,
    /// Display label, e.g. `"Moving In Vehicle"`
    pub label: String,
    /// Accumulated duration, never negative
    #[serde(rename = "duration_sec", with = "duration_secs")]
    pub duration: Duration,
}

impl QuantifiedResult {
    pub fn new(category: Category, duration: Duration) -> Self {
        Self {
            category,
            label: category.display_label(),
            duration,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.duration == Duration::zero()
    }
}

/// Serialize [`chrono::Duration`] as whole seconds
pub(crate) mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(secs))
    }
}
