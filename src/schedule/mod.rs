//! Schedule tags for SnapWarden.
//!
//! Turns a schedule tag value into a [`SchedulePolicy`] and decides whether that policy is
//! due at a given instant.

mod grammar;
mod timezone;
mod window;

pub use grammar::{
    is_hhmm, parse_tag_values, weekday_abbrev, DaysActive, ScheduleDefaults, SchedulePolicy,
    DEFAULT_ALIASES,
};
pub use timezone::{standardize_tz, TimeZoneSpec};
pub use window::{LocalWindow, WindowEvaluator, DEFAULT_TOLERANCE_MINUTES};
