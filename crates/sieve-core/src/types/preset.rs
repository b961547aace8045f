//! Preset DTOs exchanged with the management API.
//!
//! Presets carry schedule times as caller-local `HH:MM` strings and category
//! treatments as status labels. Conversion to [`Settings`] validates both and
//! applies the UTC offset once, so the query path never parses strings.

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::policy::{weekday_index, Category, Schedule, Settings};
use crate::{CoreError, Result};

/// Largest accepted UTC offset magnitude, in minutes.
pub const MAX_UTC_OFFSET_MINUTES: i32 = 24 * 60;

const TIME_FORMAT: &str = "%H:%M";

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// A category and its status label (`inactive`, `blocked` or `active`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetCategory {
    /// Category name as configured in the blocklists.
    pub name: String,
    /// Status label.
    pub status: String,
}

/// One weekday window in caller-local time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetSchedule {
    /// Weekday name, e.g. `Monday`.
    pub day: String,
    /// Start time, `HH:MM`.
    pub start_time: String,
    /// End time, `HH:MM`.
    pub end_time: String,
}

/// Editable preset fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetFields {
    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Whether filtering is active.
    #[serde(default)]
    pub enabled: bool,

    /// Minutes to add to local time to get UTC.
    #[serde(default, rename = "offset")]
    pub utc_offset: i32,

    /// Category treatments.
    #[serde(default)]
    pub categories: Vec<PresetCategory>,

    /// Weekly windows.
    #[serde(default)]
    pub schedule: Vec<PresetSchedule>,
}

/// A stored preset as returned by the management API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Caller ID.
    pub id: String,

    /// Preset contents.
    #[serde(flatten)]
    pub fields: PresetFields,
}

impl Settings {
    /// Convert management API fields into settings for `id`.
    pub fn from_preset(id: impl Into<String>, fields: &PresetFields) -> Result<Self> {
        if fields.utc_offset.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(CoreError::InvalidPreset(format!(
                "utc offset {} out of range",
                fields.utc_offset
            )));
        }

        let mut settings = Self::new(id, fields.name.clone());
        settings.enabled = fields.enabled;
        settings.utc_offset_minutes = fields.utc_offset;

        for category in &fields.categories {
            let treatment = Category::from_status(&category.status).ok_or_else(|| {
                CoreError::InvalidPreset(format!(
                    "unknown status '{}' for category '{}'",
                    category.status, category.name
                ))
            })?;
            settings.categories.insert(category.name.clone(), treatment);
        }

        for window in &fields.schedule {
            let weekday: Weekday = window
                .day
                .parse()
                .map_err(|_| CoreError::InvalidPreset(format!("unknown day '{}'", window.day)))?;
            let start = parse_time(&window.start_time)?;
            let end = parse_time(&window.end_time)?;
            settings.set_schedule(
                weekday,
                Schedule::from_local(start, end, fields.utc_offset),
            );
        }

        Ok(settings)
    }
}

impl From<&Settings> for PresetResponse {
    fn from(settings: &Settings) -> Self {
        let mut categories: Vec<PresetCategory> = settings
            .categories
            .iter()
            .map(|(name, category)| PresetCategory {
                name: name.clone(),
                status: category.status().to_string(),
            })
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));

        let schedule = settings
            .schedule
            .iter()
            .map(|(day, window)| {
                let (start, end) = window.local_window(settings.utc_offset_minutes);
                PresetSchedule {
                    day: WEEKDAY_NAMES[usize::from(*day) % 7].to_string(),
                    start_time: start.format(TIME_FORMAT).to_string(),
                    end_time: end.format(TIME_FORMAT).to_string(),
                }
            })
            .collect();

        Self {
            id: settings.id.clone(),
            fields: PresetFields {
                name: settings.name.clone(),
                enabled: settings.enabled,
                utc_offset: settings.utc_offset_minutes,
                categories,
                schedule,
            },
        }
    }
}

/// Full English name for a weekday.
#[must_use]
pub fn weekday_name(weekday: Weekday) -> &'static str {
    WEEKDAY_NAMES[usize::from(weekday_index(weekday))]
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|e| CoreError::InvalidPreset(format!("invalid time '{value}': {e}")))
}
