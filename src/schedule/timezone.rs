//! Time zone label normalization.
//!
//! Operators type zone names into tags by hand, so the label is canonicalized before it is
//! handed to the zone database: `utc` becomes `UTC`, `us/eastern` becomes `US/Eastern`,
//! `america/new_york` becomes `America/New_York`. Anything without a `/` that is not
//! `GMT`/`UTC` is rejected.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::error::{Result, SnapwardenError};

/// A time zone label after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "label", rename_all = "snake_case")]
pub enum TimeZoneSpec {
    /// Canonical label, ready for zone lookup.
    Valid(String),
    /// Raw label that could not be normalized.
    Invalid(String),
}

impl TimeZoneSpec {
    pub fn is_valid(&self) -> bool {
        matches!(self, TimeZoneSpec::Valid(_))
    }

    /// Resolve the label against the zone database.
    ///
    /// A label can normalize cleanly and still be unknown (`US/East-Coast`).
    pub fn resolve(&self) -> Result<Tz> {
        match self {
            TimeZoneSpec::Valid(label) => label
                .parse::<Tz>()
                .map_err(|_| SnapwardenError::UnknownTimeZone(label.clone())),
            TimeZoneSpec::Invalid(raw) => Err(SnapwardenError::InvalidTimeZone(raw.clone())),
        }
    }
}

impl fmt::Display for TimeZoneSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeZoneSpec::Valid(label) => write!(f, "{}", label),
            TimeZoneSpec::Invalid(raw) => write!(f, "invalid({})", raw),
        }
    }
}

/// Canonicalize a free-form time zone label.
///
/// A region part that is any substring of `"US"` (including `"U"`, `"S"` and the empty
/// string) keeps the all-caps form, so `s/pacific` becomes `S/Pacific`.
pub fn standardize_tz(tz: &str) -> TimeZoneSpec {
    let upper = tz.to_uppercase();
    if upper == "GMT" || upper == "UTC" {
        return TimeZoneSpec::Valid(upper);
    }

    if let Some((region, city)) = tz.split_once('/') {
        let region_upper = region.to_uppercase();
        let region = if "US".contains(region_upper.as_str()) {
            region_upper
        } else {
            title_case(region)
        };
        return TimeZoneSpec::Valid(format!("{}/{}", region, title_case(city)));
    }

    warn!(
        time_zone = %tz,
        "Time zone is not in the standard format, expected GMT, UTC or Region/City"
    );
    TimeZoneSpec::Invalid(tz.to_string())
}

/// Uppercase the first letter of every alphabetic run and lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
