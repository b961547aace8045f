//! Policy and preset types.

pub mod policy;
pub mod preset;

pub use policy::{weekday_index, Category, Schedule, Settings};
pub use preset::{
    weekday_name, PresetCategory, PresetFields, PresetResponse, PresetSchedule,
    MAX_UTC_OFFSET_MINUTES,
};
