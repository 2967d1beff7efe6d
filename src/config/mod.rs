//! Configuration module for SnapWarden.

use crate::error::{Result, SnapwardenError};
use crate::schedule::{is_hhmm, standardize_tz, ScheduleDefaults};
use crate::snapshot::Retention;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for a scheduler run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Snapshot policy defaults.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// How often the scheduler is invoked; the width of the due window.
    #[serde(with = "humantime_serde", default = "default_execution_interval")]
    pub execution_interval: Duration,
    /// Regions to process. Empty means every region.
    #[serde(default)]
    pub regions: Vec<String>,
    /// History store configuration.
    #[serde(default)]
    pub history: HistoryConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Upper bound on the execution interval; an `HHMM` window cannot span a full day.
pub const MAX_EXECUTION_INTERVAL: Duration = Duration::from_secs(24 * 3600);

fn default_execution_interval() -> Duration {
    Duration::from_secs(4 * 60)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            execution_interval: default_execution_interval(),
            regions: Vec::new(),
            history: HistoryConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SnapwardenError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            SnapwardenError::Config(format!("Failed to parse config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.policy.custom_tag_name.is_empty() {
            return Err(SnapwardenError::InvalidConfig {
                field: "policy.custom_tag_name".to_string(),
                reason: "Tag name must not be empty".to_string(),
            });
        }

        let start = &self.policy.default_snapshot_time;
        let in_range = is_hhmm(start)
            && start[..2].parse::<u32>().map(|h| h < 24).unwrap_or(false)
            && start[2..].parse::<u32>().map(|m| m < 60).unwrap_or(false);
        if !in_range {
            return Err(SnapwardenError::InvalidConfig {
                field: "policy.default_snapshot_time".to_string(),
                reason: format!("'{}' is not a 24-hour HHMM time", start),
            });
        }

        if self.policy.default_retention_days <= 0 {
            return Err(SnapwardenError::InvalidConfig {
                field: "policy.default_retention_days".to_string(),
                reason: "Retention days must be positive".to_string(),
            });
        }

        if !standardize_tz(&self.policy.default_time_zone).is_valid() {
            return Err(SnapwardenError::InvalidConfig {
                field: "policy.default_time_zone".to_string(),
                reason: format!("'{}' is not a recognizable time zone", self.policy.default_time_zone),
            });
        }

        if self.execution_interval.is_zero() || self.execution_interval >= MAX_EXECUTION_INTERVAL {
            return Err(SnapwardenError::InvalidConfig {
                field: "execution_interval".to_string(),
                reason: "Execution interval must be non-zero and shorter than a day".to_string(),
            });
        }

        Ok(())
    }

    /// Create a development configuration with auto deletion enabled.
    pub fn development() -> Self {
        Self {
            policy: PolicyConfig {
                auto_snapshot_deletion: true,
                ..PolicyConfig::default()
            },
            execution_interval: default_execution_interval(),
            regions: vec![],
            history: HistoryConfig {
                path: PathBuf::from("/tmp/snapwarden/history.json"),
            },
            observability: ObservabilityConfig {
                log_level: "debug".to_string(),
                json_logs: false,
            },
        }
    }

    /// Whether a region should be processed.
    pub fn includes_region(&self, region: &str) -> bool {
        self.regions.is_empty() || self.regions.iter().any(|r| r == region)
    }
}

/// Snapshot policy defaults applied to every schedule tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Key prefix identifying schedule tags; also the key of the tag applied to new snapshots.
    pub custom_tag_name: String,
    /// Start time used by `default`/`true` tags, `HHMM`.
    pub default_snapshot_time: String,
    /// Retention used when a tag gives none.
    pub default_retention_days: i64,
    /// Purge expired snapshots and record purge deadlines.
    pub auto_snapshot_deletion: bool,
    /// Time zone used when a tag gives none.
    pub default_time_zone: String,
    /// Active days used when a tag gives none.
    pub default_days_active: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            custom_tag_name: "scheduler:ebs-snapshot".to_string(),
            default_snapshot_time: "2330".to_string(),
            default_retention_days: 15,
            auto_snapshot_deletion: false,
            default_time_zone: "UTC".to_string(),
            default_days_active: "all".to_string(),
        }
    }
}

impl PolicyConfig {
    /// Defaults handed to the tag parser.
    pub fn schedule_defaults(&self) -> ScheduleDefaults {
        ScheduleDefaults::new(
            self.default_snapshot_time.clone(),
            Retention::Days(self.default_retention_days),
            self.default_time_zone.clone(),
            self.default_days_active.to_lowercase(),
        )
    }
}

/// History store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// JSON history file.
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/snapwarden/history.json"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level.
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Serde helper for Duration using humantime format.
pub mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let (value, unit_secs) = if let Some(ms) = s.strip_suffix("ms") {
            return ms
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string());
        } else if let Some(h) = s.strip_suffix('h') {
            (h, 3600)
        } else if let Some(m) = s.strip_suffix('m') {
            (m, 60)
        } else if let Some(s_val) = s.strip_suffix('s') {
            (s_val, 1)
        } else {
            (s, 1)
        };

        let value = value.parse::<u64>().map_err(|e| e.to_string())?;
        value
            .checked_mul(unit_secs)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration '{}' is out of range", s))
    }
}
