//! Snapshot window evaluation.
//!
//! The scheduler is invoked on a fixed interval rather than continuously, so a policy is due
//! when its start time fell within the last interval: `now - tolerance <= start_time <= now`,
//! evaluated in the policy's local time.
//!
//! Times are compared as zero-padded `HHMM` strings. A window that crosses local midnight
//! (lower bound `2358`, now `0002`) matches nothing; start times in that gap are skipped for
//! the day.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use serde::Serialize;

use super::grammar::{weekday_abbrev, SchedulePolicy};
use crate::error::{Result, SnapwardenError};

/// Default execution interval tolerance.
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 4;

/// The local-time window a policy is checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalWindow {
    /// Local wall-clock time, RFC 3339.
    pub local_time: String,
    /// `HHMM` of the current local time.
    pub now: String,
    /// `HHMM` of the current local time minus the tolerance.
    pub lower_bound: String,
    /// Lowercase weekday abbreviation of the current local day.
    pub weekday: String,
    #[serde(skip)]
    day: Weekday,
}

impl LocalWindow {
    /// Whether `start_time` lies within `[lower_bound, now]`.
    pub fn contains(&self, start_time: &str) -> bool {
        self.lower_bound.as_str() <= start_time && start_time <= self.now.as_str()
    }

    pub fn day(&self) -> Weekday {
        self.day
    }
}

/// Decides whether a schedule is due at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct WindowEvaluator {
    tolerance: Duration,
}

impl Default for WindowEvaluator {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_TOLERANCE_MINUTES))
    }
}

impl WindowEvaluator {
    /// Create an evaluator with the given tolerance.
    pub fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    /// Create an evaluator from the scheduler's execution interval.
    pub fn from_interval(interval: std::time::Duration) -> Result<Self> {
        let tolerance = Duration::from_std(interval).map_err(|e| {
            SnapwardenError::InvalidArgument(format!("execution interval out of range: {}", e))
        })?;
        Ok(Self::new(tolerance))
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Compute the local window for `policy` at `now`.
    ///
    /// Fails when the policy's time zone is invalid or unknown to the zone database.
    pub fn local_window(&self, policy: &SchedulePolicy, now: DateTime<Utc>) -> Result<LocalWindow> {
        let tz = policy.time_zone.resolve()?;
        let local = now.with_timezone(&tz);
        let lower = local.checked_sub_signed(self.tolerance).ok_or_else(|| {
            SnapwardenError::InvalidArgument(format!(
                "tolerance of {} minutes reaches outside the representable time range",
                self.tolerance.num_minutes()
            ))
        })?;

        Ok(LocalWindow {
            local_time: local.to_rfc3339(),
            now: local.format("%H%M").to_string(),
            lower_bound: lower.format("%H%M").to_string(),
            weekday: weekday_abbrev(local.weekday()).to_string(),
            day: local.weekday(),
        })
    }

    /// Whether `policy` is due at `now`.
    pub fn is_due(&self, policy: &SchedulePolicy, now: DateTime<Utc>) -> Result<bool> {
        let window = self.local_window(policy, now)?;
        Ok(policy.days_active.is_active(window.day()) && window.contains(&policy.start_time))
    }
}
