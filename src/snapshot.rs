//! Snapshot records and retention for SnapWarden.
//!
//! Every snapshot the scheduler creates is tracked by a [`SnapshotRecord`] in the history
//! store. The record carries the purge deadline derived from the instance's [`Retention`];
//! [`purge`] uses it to expire snapshots and [`lifecycle`] creates it.
//!
//! Timestamps are persisted as naive UTC strings (`2026-10-18 23:30:00.000000`) and the
//! "never expires" deadline as the literal `NA`, so records written by older deployments
//! keep loading.

pub mod lifecycle;
pub mod purge;

pub use lifecycle::{BackupOutcome, LifecycleRecorder};
pub use purge::{PurgeEngine, PurgeOutcome};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::{Result, SnapwardenError};

/// Persisted marker for "never expires".
pub const NO_EXPIRY_SENTINEL: &str = "NA";

/// Format used for persisted timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format a UTC timestamp for persistence.
pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a persisted timestamp. The fractional part is optional.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| SnapwardenError::InvalidTimestamp(format!("{}: {}", s, e)))
}

/// How long a new snapshot is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// Purge after this many days.
    Days(i64),
    /// Keep until deleted by hand.
    NoExpiry,
}

impl Retention {
    /// Purge deadline for a snapshot created at `created`.
    pub fn purge_time(&self, created: NaiveDateTime) -> PurgeTime {
        match self {
            Retention::Days(days) => Duration::try_days(*days)
                .and_then(|d| created.checked_add_signed(d))
                .map(PurgeTime::At)
                .unwrap_or_else(|| {
                    warn!(days = *days, "Retention days out of range, snapshot will not expire");
                    PurgeTime::NoExpiry
                }),
            Retention::NoExpiry => PurgeTime::NoExpiry,
        }
    }
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retention::Days(days) => write!(f, "{} days", days),
            Retention::NoExpiry => write!(f, "{}", NO_EXPIRY_SENTINEL),
        }
    }
}

/// When a snapshot becomes eligible for purging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeTime {
    At(NaiveDateTime),
    NoExpiry,
}

impl PurgeTime {
    /// Whether the deadline has passed at `now`. Never true for [`PurgeTime::NoExpiry`].
    pub fn is_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self {
            PurgeTime::At(deadline) => *deadline <= now.naive_utc(),
            PurgeTime::NoExpiry => false,
        }
    }
}

impl fmt::Display for PurgeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurgeTime::At(deadline) => write!(f, "{}", format_timestamp(deadline)),
            PurgeTime::NoExpiry => write!(f, "{}", NO_EXPIRY_SENTINEL),
        }
    }
}

impl FromStr for PurgeTime {
    type Err = SnapwardenError;

    fn from_str(s: &str) -> Result<Self> {
        if s == NO_EXPIRY_SENTINEL {
            Ok(PurgeTime::NoExpiry)
        } else {
            parse_timestamp(s).map(PurgeTime::At)
        }
    }
}

impl Serialize for PurgeTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PurgeTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Serde helper for persisted timestamps.
pub mod timestamp_serde {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_timestamp(&s).map_err(serde::de::Error::custom)
    }
}

/// History entry for one scheduler-created snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Provider snapshot ID; the history key.
    pub snapshot_id: String,
    pub region: String,
    pub instance_id: String,
    pub volume_id: String,
    /// Volume size in GiB.
    pub size: u64,
    pub purge_time: PurgeTime,
    /// When the snapshot was requested.
    #[serde(with = "timestamp_serde")]
    pub start_time: NaiveDateTime,
}

/// Kind of per-resource operation that can fail without aborting a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListVolumes,
    CreateSnapshot,
    RecordHistory,
    DeleteHistory,
    DeleteSnapshot,
    TagSnapshots,
    EvaluateSchedule,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::ListVolumes => "list_volumes",
            Operation::CreateSnapshot => "create_snapshot",
            Operation::RecordHistory => "record_history",
            Operation::DeleteHistory => "delete_history",
            Operation::DeleteSnapshot => "delete_snapshot",
            Operation::TagSnapshots => "tag_snapshots",
            Operation::EvaluateSchedule => "evaluate_schedule",
        };
        write!(f, "{}", name)
    }
}

/// A per-resource failure that was logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFailure {
    /// Volume, instance or snapshot the operation targeted.
    pub resource_id: String,
    pub operation: Operation,
    pub reason: String,
}

impl OperationFailure {
    pub fn new(resource_id: impl Into<String>, operation: Operation, error: &SnapwardenError) -> Self {
        Self {
            resource_id: resource_id.into(),
            operation,
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.operation, self.resource_id, self.reason)
    }
}
