//! Schedule tag grammar.
//!
//! A schedule tag value is a `;`-separated list of positional fields:
//!
//! ```text
//! start_time[;retention_days|time_zone[;time_zone|days_active[;days_active]]]
//! ```
//!
//! | Tag value                       | Resolves                                   |
//! |---------------------------------|--------------------------------------------|
//! | `default` / `true`              | every field from defaults                  |
//! | `0130`                          | start time                                 |
//! | `0130;5`                        | start time, retention days                 |
//! | `0130;US/Eastern`               | start time, time zone                      |
//! | `0130;7;US/Pacific`             | start time, retention days, time zone      |
//! | `0130;US/Pacific;weekdays`      | start time, time zone, active days         |
//! | `0130;7;US/Pacific;mon,wed,fri` | all four fields                            |
//!
//! In the 2- and 3-field forms the second field is read as retention days when it is an
//! integer and as a time zone otherwise.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use super::timezone::{standardize_tz, TimeZoneSpec};
use crate::snapshot::Retention;

/// First-field values that select the default start time.
pub const DEFAULT_ALIASES: [&str; 2] = ["default", "true"];

/// Days on which a schedule may fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaysActive {
    /// Every day of the week.
    All,
    /// Monday through Friday.
    Weekdays,
    /// Explicit list of lowercase weekday abbreviations (`mon`, `tue`, ...).
    Days(Vec<String>),
}

impl DaysActive {
    /// Parse an active-days field, case-insensitively.
    pub fn parse(value: &str) -> Self {
        let value = value.to_lowercase();
        match value.as_str() {
            "all" => DaysActive::All,
            "weekdays" => DaysActive::Weekdays,
            _ => DaysActive::Days(value.split(',').map(|d| d.trim().to_string()).collect()),
        }
    }

    /// Whether the schedule is active on the given weekday.
    pub fn is_active(&self, day: Weekday) -> bool {
        match self {
            DaysActive::All => true,
            DaysActive::Weekdays => !matches!(day, Weekday::Sat | Weekday::Sun),
            DaysActive::Days(days) => {
                let abbrev = weekday_abbrev(day);
                days.iter().any(|d| d.eq_ignore_ascii_case(abbrev))
            }
        }
    }
}

impl fmt::Display for DaysActive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaysActive::All => write!(f, "all"),
            DaysActive::Weekdays => write!(f, "weekdays"),
            DaysActive::Days(days) => write!(f, "{}", days.join(",")),
        }
    }
}

/// Lowercase three-letter weekday abbreviation.
pub fn weekday_abbrev(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

/// Fallback values for fields a tag leaves out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDefaults {
    /// First-field values that select `start_time`.
    pub aliases: [String; 2],
    /// Start time used when the first field is an alias.
    pub start_time: String,
    pub retention: Retention,
    /// Raw time zone label; normalized like any tag-supplied label.
    pub time_zone: String,
    pub days_active: String,
}

impl ScheduleDefaults {
    /// Create defaults using the standard `default`/`true` aliases.
    pub fn new(
        start_time: impl Into<String>,
        retention: Retention,
        time_zone: impl Into<String>,
        days_active: impl Into<String>,
    ) -> Self {
        Self {
            aliases: DEFAULT_ALIASES.map(String::from),
            start_time: start_time.into(),
            retention,
            time_zone: time_zone.into(),
            days_active: days_active.into(),
        }
    }

    /// Replace the start-time aliases.
    pub fn with_aliases(mut self, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.aliases = [first.into(), second.into()];
        self
    }

    fn is_alias(&self, field: &str) -> bool {
        let field = field.to_lowercase();
        self.aliases.iter().any(|alias| alias.to_lowercase() == field)
    }
}

impl Default for ScheduleDefaults {
    fn default() -> Self {
        Self::new("2330", Retention::Days(15), "UTC", "all")
    }
}

/// Fully resolved schedule for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePolicy {
    /// Local start time as `HHMM`.
    pub start_time: String,
    pub retention: Retention,
    pub time_zone: TimeZoneSpec,
    pub days_active: DaysActive,
}

/// Resolve a raw schedule tag value into a [`SchedulePolicy`].
///
/// Unparseable fields fall back to `defaults`; a time zone that cannot be normalized is
/// kept as [`TimeZoneSpec::Invalid`].
pub fn parse_tag_values(tag: &str, defaults: &ScheduleDefaults) -> SchedulePolicy {
    let ptag: Vec<&str> = tag.split(';').collect();

    let start_time = if defaults.is_alias(ptag[0]) {
        defaults.start_time.clone()
    } else {
        ptag[0].to_string()
    };
    if !is_hhmm(&start_time) {
        warn!(start_time = %start_time, tag = %tag, "Start time is not a 4-digit HHMM value");
    }

    let mut retention = defaults.retention.clone();
    let mut time_zone = defaults.time_zone.clone();
    let mut days_active = defaults.days_active.to_lowercase();

    match ptag.len() {
        2 => match parse_int(ptag[1]) {
            Some(days) => retention = Retention::Days(days),
            None => time_zone = ptag[1].to_string(),
        },
        3 => match parse_int(ptag[1]) {
            Some(days) => {
                retention = Retention::Days(days);
                time_zone = ptag[2].to_string();
            }
            None => {
                time_zone = ptag[1].to_string();
                days_active = ptag[2].to_lowercase();
            }
        },
        n if n > 3 => {
            match parse_int(ptag[1]) {
                Some(days) => retention = Retention::Days(days),
                None => warn!(
                    field = %ptag[1],
                    tag = %tag,
                    "Retention days is not an integer, keeping default"
                ),
            }
            time_zone = ptag[2].to_string();
            days_active = ptag[3].to_lowercase();
        }
        _ => {}
    }

    SchedulePolicy {
        start_time,
        retention,
        time_zone: standardize_tz(&time_zone),
        days_active: DaysActive::parse(&days_active),
    }
}

/// Whether `s` is exactly four ASCII digits.
pub fn is_hhmm(s: &str) -> bool {
    s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_int(field: &str) -> Option<i64> {
    field.trim().parse::<i64>().ok()
}
