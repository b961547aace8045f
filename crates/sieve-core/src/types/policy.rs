//! Per-caller filtering policy.
//!
//! A [`Settings`] value is what the resolver loads on every query: which
//! categories are blocked outright, which are only allowed inside a weekly
//! time window, and the caller's UTC offset.
//!
//! # Time frames
//!
//! Schedules are stored already shifted by the caller's offset. The offset
//! follows the browser `getTimezoneOffset()` convention: the number of minutes
//! to *add* to the caller's wall clock to get UTC (UTC+05:30 is `-330`).
//! Window checks convert both the current instant and the stored window back
//! to the caller's wall clock, so the server's own timezone never matters.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// How a caller treats a domain category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Explicitly inert, never blocks.
    #[serde(alias = "white")]
    Neutral,
    /// Always blocked.
    #[serde(alias = "black")]
    Blocked,
    /// Allowed only inside the caller's schedule window.
    #[serde(alias = "blue")]
    Scheduled,
}

impl Category {
    /// Status label used by the management API.
    #[must_use]
    pub const fn status(self) -> &'static str {
        match self {
            Self::Neutral => "inactive",
            Self::Blocked => "blocked",
            Self::Scheduled => "active",
        }
    }

    /// Parse a management API status label.
    #[must_use]
    pub fn from_status(status: &str) -> Option<Self> {
        match status {
            "inactive" => Some(Self::Neutral),
            "blocked" => Some(Self::Blocked),
            "active" => Some(Self::Scheduled),
            _ => None,
        }
    }
}

/// Allowed time window for one weekday, stored offset-adjusted.
///
/// Only hour and minute are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Window start, shifted by the caller's offset.
    pub start: NaiveTime,
    /// Window end, shifted by the caller's offset.
    pub end: NaiveTime,
}

impl Schedule {
    /// Build a schedule from already-adjusted times.
    #[must_use]
    pub const fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Build a schedule from the caller's wall-clock times.
    #[must_use]
    pub fn from_local(start: NaiveTime, end: NaiveTime, utc_offset_minutes: i32) -> Self {
        let shift = offset_delta(utc_offset_minutes);
        Self {
            start: start.overflowing_add_signed(shift).0,
            end: end.overflowing_add_signed(shift).0,
        }
    }

    /// The window in the caller's wall clock.
    #[must_use]
    pub fn local_window(&self, utc_offset_minutes: i32) -> (NaiveTime, NaiveTime) {
        let shift = offset_delta(utc_offset_minutes);
        (
            self.start.overflowing_sub_signed(shift).0,
            self.end.overflowing_sub_signed(shift).0,
        )
    }

    /// The window anchored on a caller-local date.
    ///
    /// An end earlier than the start means the window crosses midnight.
    #[must_use]
    pub fn window_on(&self, day: NaiveDate, utc_offset_minutes: i32) -> (NaiveDateTime, NaiveDateTime) {
        let (start, end) = self.local_window(utc_offset_minutes);
        let start_at = day.and_time(start);
        let mut end_at = day.and_time(end);
        if end_at < start_at {
            end_at += TimeDelta::days(1);
        }
        (start_at, end_at)
    }
}

/// A caller's filtering policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Opaque caller ID (DoT SNI label, DoH path segment).
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Disabled policies never block.
    #[serde(default)]
    pub enabled: bool,

    /// Category name to treatment.
    #[serde(default)]
    pub categories: HashMap<String, Category>,

    /// Weekday index (0 = Sunday) to allowed window.
    #[serde(default)]
    pub schedule: BTreeMap<u8, Schedule>,

    /// Minutes to add to the caller's wall clock to get UTC.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Settings {
    /// Create an enabled policy with no categories and no schedule.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            categories: HashMap::new(),
            schedule: BTreeMap::new(),
            utc_offset_minutes: 0,
        }
    }

    /// Treatment for a category name, if the caller mapped it.
    #[must_use]
    pub fn category(&self, name: &str) -> Option<Category> {
        self.categories.get(name).copied()
    }

    /// Schedule for a weekday.
    #[must_use]
    pub fn schedule_for(&self, weekday: Weekday) -> Option<&Schedule> {
        self.schedule.get(&weekday_index(weekday))
    }

    /// Set (or replace) the schedule for a weekday.
    pub fn set_schedule(&mut self, weekday: Weekday, schedule: Schedule) {
        self.schedule.insert(weekday_index(weekday), schedule);
    }

    /// The caller's wall-clock time at `now`.
    #[must_use]
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.naive_utc() - offset_delta(self.utc_offset_minutes)
    }

    /// Whether `now` falls strictly inside an allowed window.
    ///
    /// Checks the window of the caller's current weekday and the part of the
    /// previous day's window that runs past midnight. Boundaries are exclusive.
    #[must_use]
    pub fn within_schedule(&self, now: DateTime<Utc>) -> bool {
        let local = self.local_time(now);
        let today = local.date();

        [Some(today), today.pred_opt()]
            .into_iter()
            .flatten()
            .filter_map(|day| {
                self.schedule_for(day.weekday())
                    .map(|schedule| schedule.window_on(day, self.utc_offset_minutes))
            })
            .any(|(start, end)| start < local && local < end)
    }
}

/// Map a weekday to its stored index (0 = Sunday).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_sunday() as u8
}

fn offset_delta(utc_offset_minutes: i32) -> TimeDelta {
    TimeDelta::minutes(i64::from(utc_offset_minutes))
}
