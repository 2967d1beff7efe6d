//! Snapshot creation and history recording.
//!
//! For every volume attached to a due instance the recorder requests a snapshot, derives
//! its purge deadline from the instance's retention and writes a history record. A volume
//! that fails at either step is logged and skipped; the rest of the instance is still
//! processed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Operation, OperationFailure, Retention, SnapshotRecord};
use crate::history::HistoryStore;
use crate::provider::{CloudProvider, Volume};

/// Product name written into snapshot descriptions.
pub const DESCRIPTION_PRODUCT: &str = "SnapWarden";

/// Result of backing up one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupOutcome {
    /// Snapshots that were both created and recorded.
    pub created: Vec<String>,
    /// Volumes that were skipped.
    pub failures: Vec<OperationFailure>,
}

impl BackupOutcome {
    pub fn merge(&mut self, other: BackupOutcome) {
        self.created.extend(other.created);
        self.failures.extend(other.failures);
    }
}

/// Creates snapshots for due instances and records them in history.
pub struct LifecycleRecorder {
    provider: Arc<dyn CloudProvider>,
    history: Arc<dyn HistoryStore>,
}

impl LifecycleRecorder {
    /// Create a recorder for the provider's region.
    pub fn new(provider: Arc<dyn CloudProvider>, history: Arc<dyn HistoryStore>) -> Self {
        Self { provider, history }
    }

    /// Snapshot every volume attached to `instance_id`.
    pub async fn backup_instance(
        &self,
        instance_id: &str,
        retention: &Retention,
        now: DateTime<Utc>,
    ) -> BackupOutcome {
        let volumes = match self.provider.list_attached_volumes(instance_id).await {
            Ok(volumes) => volumes,
            Err(e) => {
                warn!(
                    instance_id = %instance_id,
                    error = %e,
                    "Failed to list attached volumes"
                );
                return BackupOutcome {
                    created: Vec::new(),
                    failures: vec![OperationFailure::new(instance_id, Operation::ListVolumes, &e)],
                };
            }
        };

        self.backup_volumes(instance_id, &volumes, retention, now).await
    }

    /// Snapshot the given volumes of `instance_id`.
    pub async fn backup_volumes(
        &self,
        instance_id: &str,
        volumes: &[Volume],
        retention: &Retention,
        now: DateTime<Utc>,
    ) -> BackupOutcome {
        let mut outcome = BackupOutcome::default();
        let region = self.provider.region().to_string();

        for volume in volumes {
            let description = describe(&volume.volume_id, instance_id, now);
            let created_at = now.naive_utc();
            let purge_time = retention.purge_time(created_at);

            let snapshot = match self
                .provider
                .create_snapshot(&volume.volume_id, &description)
                .await
            {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(
                        volume_id = %volume.volume_id,
                        instance_id = %instance_id,
                        error = %e,
                        "Snapshot creation failed"
                    );
                    outcome.failures.push(OperationFailure::new(
                        &volume.volume_id,
                        Operation::CreateSnapshot,
                        &e,
                    ));
                    continue;
                }
            };

            let record = SnapshotRecord {
                snapshot_id: snapshot.snapshot_id.clone(),
                region: region.clone(),
                instance_id: instance_id.to_string(),
                volume_id: volume.volume_id.clone(),
                size: volume.size,
                purge_time,
                start_time: created_at,
            };

            if let Err(e) = self.history.put(&record).await {
                warn!(
                    snapshot_id = %snapshot.snapshot_id,
                    volume_id = %volume.volume_id,
                    error = %e,
                    "Failed to record snapshot in history"
                );
                outcome.failures.push(OperationFailure::new(
                    &snapshot.snapshot_id,
                    Operation::RecordHistory,
                    &e,
                ));
                continue;
            }

            debug!(
                snapshot_id = %record.snapshot_id,
                volume_id = %record.volume_id,
                purge_time = %record.purge_time,
                "Snapshot recorded"
            );
            outcome.created.push(snapshot.snapshot_id);
        }

        if !outcome.created.is_empty() {
            info!(
                instance_id = %instance_id,
                region = %region,
                created = outcome.created.len(),
                "Instance snapshots created"
            );
        }

        outcome
    }
}

/// Human-readable snapshot description.
fn describe(volume_id: &str, instance_id: &str, now: DateTime<Utc>) -> String {
    format!(
        "Created by {} from {}({}) at {} UTC",
        DESCRIPTION_PRODUCT,
        volume_id,
        instance_id,
        now.format("%b %d,%H:%M")
    )
}
