//! Fixtures shared by the scheduler integration tests.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use snapwarden::config::SchedulerConfig;
use snapwarden::error::{Result, SnapwardenError};
use snapwarden::history::{HistoryStore, MemoryHistoryStore};
use snapwarden::provider::{MemoryCloud, MemoryProvider, Tag, Volume};
use snapwarden::snapshot::{PurgeTime, SnapshotRecord};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const TAG_KEY: &str = "scheduler:ebs-snapshot";

/// Wednesday 2026-10-21 at the given UTC time.
pub fn wednesday(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 21, h, m, 0).unwrap()
}

pub fn naive(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap().naive_utc()
}

/// Scheduler configuration with auto deletion switched as requested.
pub fn config(auto_delete: bool) -> SchedulerConfig {
    let mut config = SchedulerConfig::default();
    config.policy.auto_snapshot_deletion = auto_delete;
    config
}

pub fn record(snapshot_id: &str, region: &str, purge_time: PurgeTime) -> SnapshotRecord {
    SnapshotRecord {
        snapshot_id: snapshot_id.to_string(),
        region: region.to_string(),
        instance_id: "i-old".to_string(),
        volume_id: "vol-old".to_string(),
        size: 8,
        purge_time,
        start_time: naive(2026, 10, 1, 23, 30),
    }
}

/// Add an instance with one schedule tag and the given volumes.
pub async fn tagged_instance(provider: &MemoryProvider, instance_id: &str, tag: &str, volumes: &[&str]) {
    provider
        .add_instance(
            instance_id,
            vec![Tag::new(TAG_KEY, tag), Tag::new("Name", instance_id)],
            volumes.iter().map(|v| Volume::new(*v, 8)).collect(),
        )
        .await;
}

/// Cloud with the named regions, each empty.
pub async fn cloud(regions: &[&str]) -> (Arc<MemoryCloud>, Vec<Arc<MemoryProvider>>) {
    let cloud = Arc::new(MemoryCloud::new());
    let mut providers = Vec::new();
    for region in regions {
        providers.push(cloud.add_region(region).await);
    }
    (cloud, providers)
}

/// History store wrapper that fails selected operations.
#[derive(Default)]
pub struct FlakyHistoryStore {
    pub inner: MemoryHistoryStore,
    fail_put: RwLock<bool>,
    fail_delete: RwLock<HashSet<String>>,
    fail_scan: RwLock<bool>,
}

impl FlakyHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_puts(&self) {
        *self.fail_put.write().await = true;
    }

    pub async fn fail_delete_of(&self, snapshot_id: &str) {
        self.fail_delete.write().await.insert(snapshot_id.to_string());
    }

    pub async fn fail_scans(&self) {
        *self.fail_scan.write().await = true;
    }
}

#[async_trait::async_trait]
impl HistoryStore for FlakyHistoryStore {
    async fn scan(&self) -> Result<Vec<SnapshotRecord>> {
        if *self.fail_scan.read().await {
            return Err(SnapwardenError::History("scan unavailable".to_string()));
        }
        self.inner.scan().await
    }

    async fn put(&self, record: &SnapshotRecord) -> Result<()> {
        if *self.fail_put.read().await {
            return Err(SnapwardenError::History("write throttled".to_string()));
        }
        self.inner.put(record).await
    }

    async fn delete(&self, snapshot_id: &str) -> Result<()> {
        if self.fail_delete.read().await.contains(snapshot_id) {
            return Err(SnapwardenError::History("delete throttled".to_string()));
        }
        self.inner.delete(snapshot_id).await
    }
}
