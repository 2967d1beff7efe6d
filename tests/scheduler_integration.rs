//! End-to-end scheduler integration tests
//!
//! Drive full region passes against the in-memory cloud and check what ends up in the
//! provider and in history.

#[allow(dead_code)]
mod common;

use chrono::Duration;
use common::*;
use snapwarden::history::{HistoryStore, JsonFileHistoryStore, MemoryHistoryStore};
use snapwarden::provider::{FailPoint, ANY_TARGET};
use snapwarden::snapshot::{Operation, PurgeTime};
use snapwarden::SnapshotScheduler;
use std::sync::Arc;

// =============================================================================
// Snapshot Creation
// =============================================================================

#[tokio::test]
async fn test_due_instance_is_snapshotted_and_tagged() {
    let (cloud, providers) = cloud(&["us-east-1"]).await;
    let provider = &providers[0];
    tagged_instance(provider, "i-1", "default", &["vol-a", "vol-b"]).await;
    let history = Arc::new(MemoryHistoryStore::new());

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    let now = wednesday(23, 30);
    let report = scheduler.run(now).await.unwrap();

    assert!(report.failed_regions.is_empty());
    let region = &report.regions["us-east-1"];
    assert_eq!(region.due_instances, vec!["i-1".to_string()]);
    assert_eq!(region.snapshots_created(), 2);
    assert_eq!(region.snapshots_existing, 0);
    assert_eq!(region.snapshots_deleted, 0);
    assert!(region.failures.is_empty());

    for snapshot_id in &region.created {
        let tags = provider.snapshot_tags(snapshot_id).await.unwrap();
        assert_eq!(tags.get(TAG_KEY).map(String::as_str), Some("auto_delete"));

        let record = history.get(snapshot_id).await.unwrap();
        assert_eq!(record.instance_id, "i-1");
        assert_eq!(record.region, "us-east-1");
        assert_eq!(record.purge_time, PurgeTime::At(now.naive_utc() + Duration::days(15)));
    }
}

#[tokio::test]
async fn test_instance_outside_window_is_skipped() {
    let (cloud, providers) = cloud(&["us-east-1"]).await;
    tagged_instance(&providers[0], "i-1", "0600", &["vol-a"]).await;
    let history = Arc::new(MemoryHistoryStore::new());

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    let report = scheduler.run(wednesday(6, 5)).await.unwrap();

    let region = &report.regions["us-east-1"];
    assert!(region.due_instances.is_empty());
    assert_eq!(region.snapshots_created(), 0);
    assert!(providers[0].snapshot_ids().await.is_empty());
    assert!(history.is_empty().await);
}

#[tokio::test]
async fn test_each_instance_keeps_its_own_retention() {
    let (cloud, providers) = cloud(&["us-east-1"]).await;
    tagged_instance(&providers[0], "i-short", "2330;3", &["vol-s"]).await;
    tagged_instance(&providers[0], "i-long", "2328;9", &["vol-l"]).await;
    let history = Arc::new(MemoryHistoryStore::new());

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    let now = wednesday(23, 30);
    scheduler.run(now).await.unwrap();

    let records = history.scan().await.unwrap();
    assert_eq!(records.len(), 2);
    let purge_of = |volume: &str| {
        records
            .iter()
            .find(|r| r.volume_id == volume)
            .map(|r| r.purge_time)
            .unwrap()
    };
    assert_eq!(purge_of("vol-s"), PurgeTime::At(now.naive_utc() + Duration::days(3)));
    assert_eq!(purge_of("vol-l"), PurgeTime::At(now.naive_utc() + Duration::days(9)));
}

#[tokio::test]
async fn test_local_time_zone_and_weekday_gate() {
    let (cloud, providers) = cloud(&["us-west-2"]).await;
    // 23:30 UTC Wednesday is 16:30 PDT Wednesday.
    tagged_instance(&providers[0], "i-pacific", "1630;7;us/pacific;wed", &["vol-p"]).await;
    tagged_instance(&providers[0], "i-weekend", "1630;7;us/pacific;sat,sun", &["vol-w"]).await;
    let history = Arc::new(MemoryHistoryStore::new());

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    let report = scheduler.run(wednesday(23, 30)).await.unwrap();

    let region = &report.regions["us-west-2"];
    assert_eq!(region.due_instances, vec!["i-pacific".to_string()]);
    assert_eq!(providers[0].snapshots_of_volume("vol-p").await.len(), 1);
    assert!(providers[0].snapshots_of_volume("vol-w").await.is_empty());
}

#[tokio::test]
async fn test_unknown_time_zone_excludes_only_that_instance() {
    let (cloud, providers) = cloud(&["us-east-1"]).await;
    tagged_instance(&providers[0], "i-bad", "2330;7;mars/olympus", &["vol-bad"]).await;
    tagged_instance(&providers[0], "i-good", "2330;7;utc", &["vol-good"]).await;
    let history = Arc::new(MemoryHistoryStore::new());

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    let report = scheduler.run(wednesday(23, 30)).await.unwrap();

    let region = &report.regions["us-east-1"];
    assert_eq!(region.due_instances, vec!["i-good".to_string()]);
    assert_eq!(region.failures.len(), 1);
    assert_eq!(region.failures[0].resource_id, "i-bad");
    assert_eq!(region.failures[0].operation, Operation::EvaluateSchedule);
}

// =============================================================================
// Purge And Reconciliation
// =============================================================================

async fn seed_purge_fixture(provider: &snapwarden::provider::MemoryProvider, history: &dyn HistoryStore) {
    for id in ["snap-expired", "snap-future", "snap-keep"] {
        provider.add_snapshot(id).await;
    }
    let records = [
        record("snap-expired", "us-east-1", PurgeTime::At(naive(2026, 10, 20, 0, 0))),
        record("snap-future", "us-east-1", PurgeTime::At(naive(2026, 11, 1, 0, 0))),
        record("snap-keep", "us-east-1", PurgeTime::NoExpiry),
        record("snap-gone", "us-east-1", PurgeTime::At(naive(2026, 10, 2, 0, 0))),
        record("snap-gone-na", "us-east-1", PurgeTime::NoExpiry),
        record("snap-elsewhere", "eu-west-1", PurgeTime::At(naive(2026, 10, 2, 0, 0))),
    ];
    for r in &records {
        history.put(r).await.unwrap();
    }
}

#[tokio::test]
async fn test_purge_and_reconcile() {
    let (cloud, providers) = cloud(&["us-east-1"]).await;
    let history = Arc::new(MemoryHistoryStore::new());
    seed_purge_fixture(&providers[0], history.as_ref()).await;

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    let report = scheduler.run(wednesday(12, 0)).await.unwrap();

    let region = &report.regions["us-east-1"];
    assert_eq!(region.snapshots_existing, 3);
    assert_eq!(region.snapshots_deleted, 1);
    assert_eq!(region.reconciled, 2);
    assert_eq!(region.history_items_removed, 3);
    assert!(region.failures.is_empty());

    assert_eq!(
        providers[0].snapshot_ids().await,
        vec!["snap-future".to_string(), "snap-keep".to_string()]
    );
    let mut remaining: Vec<String> = history
        .scan()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.snapshot_id)
        .collect();
    remaining.sort();
    assert_eq!(remaining, vec!["snap-elsewhere", "snap-future", "snap-keep"]);
}

#[tokio::test]
async fn test_purge_is_idempotent() {
    let (cloud, providers) = cloud(&["us-east-1"]).await;
    let history = Arc::new(MemoryHistoryStore::new());
    seed_purge_fixture(&providers[0], history.as_ref()).await;

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    scheduler.run(wednesday(12, 0)).await.unwrap();
    let second = scheduler.run(wednesday(12, 0)).await.unwrap();

    let region = &second.regions["us-east-1"];
    assert_eq!(region.snapshots_deleted, 0);
    assert_eq!(region.history_items_removed, 0);
    assert_eq!(history.len().await, 3);
}

#[tokio::test]
async fn test_out_of_band_deletion_is_reconciled() {
    let (cloud, providers) = cloud(&["us-east-1"]).await;
    tagged_instance(&providers[0], "i-1", "default", &["vol-a"]).await;
    let history = Arc::new(MemoryHistoryStore::new());

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    let created = scheduler.run(wednesday(23, 30)).await.unwrap();
    let snapshot_id = created.regions["us-east-1"].created[0].clone();

    // Purge deadline is 15 days out, so only the missing snapshot can remove the record.
    assert!(providers[0].remove_snapshot(&snapshot_id).await);

    let report = scheduler
        .run(wednesday(23, 30) + Duration::hours(1))
        .await
        .unwrap();
    let region = &report.regions["us-east-1"];
    assert_eq!(region.reconciled, 1);
    assert_eq!(region.history_items_removed, 1);
    assert_eq!(region.snapshots_deleted, 0);
    assert!(region.failures.is_empty());
    assert!(history.get(&snapshot_id).await.is_none());
}

#[tokio::test]
async fn test_history_delete_failure_keeps_snapshot() {
    let (cloud, providers) = cloud(&["us-east-1"]).await;
    providers[0].add_snapshot("snap-x").await;
    let history = Arc::new(FlakyHistoryStore::new());
    history
        .put(&record("snap-x", "us-east-1", PurgeTime::At(naive(2026, 10, 1, 0, 0))))
        .await
        .unwrap();
    history.fail_delete_of("snap-x").await;

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    let report = scheduler.run(wednesday(12, 0)).await.unwrap();

    let region = &report.regions["us-east-1"];
    assert_eq!(region.snapshots_deleted, 0);
    assert_eq!(region.failures.len(), 1);
    assert_eq!(region.failures[0].operation, Operation::DeleteHistory);
    assert_eq!(providers[0].snapshot_ids().await, vec!["snap-x".to_string()]);
}

#[tokio::test]
async fn test_auto_deletion_disabled() {
    let (cloud, providers) = cloud(&["us-east-1"]).await;
    let history = Arc::new(MemoryHistoryStore::new());
    seed_purge_fixture(&providers[0], history.as_ref()).await;
    tagged_instance(&providers[0], "i-1", "2330;3", &["vol-a"]).await;

    let scheduler = SnapshotScheduler::new(config(false), cloud.clone(), history.clone()).unwrap();
    let report = scheduler.run(wednesday(23, 30)).await.unwrap();

    let region = &report.regions["us-east-1"];
    assert_eq!(region.snapshots_existing, 0);
    assert_eq!(region.snapshots_deleted, 0);
    assert_eq!(region.history_items_removed, 0);
    assert_eq!(region.snapshots_created(), 1);

    let created = history.get(&region.created[0]).await.unwrap();
    assert_eq!(created.purge_time, PurgeTime::NoExpiry);
    assert!(history.get("snap-expired").await.is_some());
    assert!(providers[0].snapshot_ids().await.contains(&"snap-expired".to_string()));
}

// =============================================================================
// Failure Isolation
// =============================================================================

#[tokio::test]
async fn test_unavailable_region_is_isolated() {
    let (cloud, providers) = cloud(&["eu-west-1", "us-east-1"]).await;
    for provider in &providers {
        tagged_instance(provider, "i-1", "default", &["vol-a"]).await;
    }
    cloud.mark_unavailable("eu-west-1").await;
    let history = Arc::new(MemoryHistoryStore::new());

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    let report = scheduler.run(wednesday(23, 30)).await.unwrap();

    assert_eq!(report.failed_regions.len(), 1);
    assert_eq!(report.failed_regions[0].region, "eu-west-1");
    assert_eq!(report.regions["us-east-1"].snapshots_created(), 1);
    assert!(!report.regions.contains_key("eu-west-1"));
    assert!(providers[0].snapshot_ids().await.is_empty());
}

#[tokio::test]
async fn test_listing_failure_is_isolated() {
    let (cloud, providers) = cloud(&["eu-west-1", "us-east-1"]).await;
    for provider in &providers {
        tagged_instance(provider, "i-1", "default", &["vol-a"]).await;
    }
    providers[0].inject_failure(FailPoint::ListInstances, ANY_TARGET).await;
    let history = Arc::new(MemoryHistoryStore::new());

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    let report = scheduler.run(wednesday(23, 30)).await.unwrap();

    assert_eq!(report.failed_regions.len(), 1);
    assert_eq!(report.total_created(), 1);
}

#[tokio::test]
async fn test_history_scan_failure_aborts_region() {
    let (cloud, providers) = cloud(&["us-east-1"]).await;
    tagged_instance(&providers[0], "i-1", "default", &["vol-a"]).await;
    let history = Arc::new(FlakyHistoryStore::new());
    history.fail_scans().await;

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    let report = scheduler.run(wednesday(23, 30)).await.unwrap();

    assert_eq!(report.failed_regions.len(), 1);
    assert!(report.regions.is_empty());
}

#[tokio::test]
async fn test_record_failure_is_collected() {
    let (cloud, providers) = cloud(&["us-east-1"]).await;
    tagged_instance(&providers[0], "i-1", "default", &["vol-a"]).await;
    let history = Arc::new(FlakyHistoryStore::new());
    history.fail_puts().await;

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    let report = scheduler.run(wednesday(23, 30)).await.unwrap();

    let region = &report.regions["us-east-1"];
    assert_eq!(region.snapshots_created(), 0);
    assert_eq!(region.failures.len(), 1);
    assert_eq!(region.failures[0].operation, Operation::RecordHistory);

    // The snapshot exists but was never recorded or tagged.
    let ids = providers[0].snapshot_ids().await;
    assert_eq!(ids.len(), 1);
    assert!(providers[0].snapshot_tags(&ids[0]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tagging_failure_is_collected() {
    let (cloud, providers) = cloud(&["us-east-1"]).await;
    tagged_instance(&providers[0], "i-1", "default", &["vol-a"]).await;
    providers[0].inject_failure(FailPoint::TagResources, ANY_TARGET).await;
    let history = Arc::new(MemoryHistoryStore::new());

    let scheduler = SnapshotScheduler::new(config(true), cloud.clone(), history.clone()).unwrap();
    let report = scheduler.run(wednesday(23, 30)).await.unwrap();

    let region = &report.regions["us-east-1"];
    assert_eq!(region.snapshots_created(), 1);
    assert_eq!(region.failures.len(), 1);
    assert_eq!(region.failures[0].operation, Operation::TagSnapshots);
    assert_eq!(history.len().await, 1);
}

#[tokio::test]
async fn test_region_allow_list() {
    let (cloud, providers) = cloud(&["eu-west-1", "us-east-1"]).await;
    for provider in &providers {
        tagged_instance(provider, "i-1", "default", &["vol-a"]).await;
    }
    let mut config = config(true);
    config.regions = vec!["us-east-1".to_string()];
    let history = Arc::new(MemoryHistoryStore::new());

    let scheduler = SnapshotScheduler::new(config, cloud.clone(), history.clone()).unwrap();
    let report = scheduler.run(wednesday(23, 30)).await.unwrap();

    assert_eq!(report.regions.len(), 1);
    assert!(report.regions.contains_key("us-east-1"));
    assert!(providers[0].snapshot_ids().await.is_empty());
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_file_history_round_trip() {
    let env = TestEnv::new();
    let (cloud, providers) = cloud(&["us-east-1"]).await;
    tagged_instance(&providers[0], "i-1", "default", &["vol-a", "vol-b"]).await;

    let history = Arc::new(JsonFileHistoryStore::new(env.history_path.clone()));
    let scheduler = SnapshotScheduler::new(config(false), cloud.clone(), history).unwrap();
    scheduler.run(wednesday(23, 30)).await.unwrap();

    let raw = std::fs::read_to_string(&env.history_path).unwrap();
    assert!(raw.contains("\"purge_time\": \"NA\""));
    assert!(raw.contains("\"start_time\": \"2026-10-21 23:30:00.000000\""));

    let reopened = JsonFileHistoryStore::new(env.history_path.clone());
    let records = reopened.scan().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.purge_time == PurgeTime::NoExpiry));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let (cloud, _) = cloud(&["us-east-1"]).await;
    let mut config = config(true);
    config.policy.default_time_zone = "nowhere".to_string();

    let result = SnapshotScheduler::new(config, cloud, Arc::new(MemoryHistoryStore::new()));
    assert!(result.is_err());
}

#[tokio::test]
async fn test_oversized_interval_is_rejected_before_running() {
    let (cloud, _) = cloud(&["us-east-1"]).await;
    let config: snapwarden::config::SchedulerConfig =
        serde_json::from_str(r#"{"execution_interval": "9000000000000m"}"#).unwrap();

    let result = SnapshotScheduler::new(config, cloud, Arc::new(MemoryHistoryStore::new()));
    assert!(result.is_err());
}
