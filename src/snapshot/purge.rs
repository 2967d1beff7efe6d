//! Retention purge and history reconciliation.
//!
//! One pass over the history store for the active region sorts records into two groups:
//!
//! - **expired**: the purge deadline has passed and the snapshot still exists. The record is
//!   removed and the snapshot deleted from the provider.
//! - **drifted**: the snapshot no longer exists in the provider (deleted by hand or by
//!   another tool). The record is removed; there is nothing left to delete.
//!
//! Records of other regions are never touched. Running the pass twice without new history
//! changes removes nothing the second time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Operation, OperationFailure, SnapshotRecord};
use crate::error::Result;
use crate::history::HistoryStore;
use crate::provider::CloudProvider;

/// Records selected for removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeCandidates {
    /// Past their purge deadline and still live.
    pub expired: Vec<String>,
    /// No longer present in the provider.
    pub drifted: Vec<String>,
}

impl PurgeCandidates {
    /// Classify `records` for `region` against the live snapshot set.
    pub fn classify(
        records: &[SnapshotRecord],
        live: &HashSet<String>,
        region: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let mut candidates = Self::default();
        let mut records: Vec<&SnapshotRecord> =
            records.iter().filter(|r| r.region == region).collect();
        records.sort_by(|a, b| a.snapshot_id.cmp(&b.snapshot_id));

        for record in records {
            if !live.contains(&record.snapshot_id) {
                candidates.drifted.push(record.snapshot_id.clone());
            } else if record.purge_time.is_elapsed(now) {
                candidates.expired.push(record.snapshot_id.clone());
            }
        }
        candidates
    }

    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.drifted.is_empty()
    }
}

/// Result of one purge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeOutcome {
    /// Expired records removed from history.
    pub purged: Vec<String>,
    /// Drifted records removed from history.
    pub reconciled: Vec<String>,
    /// Snapshots the provider confirmed deleted.
    pub deleted_snapshots: Vec<String>,
    pub failures: Vec<OperationFailure>,
}

impl PurgeOutcome {
    /// History records removed, expired and drifted combined.
    pub fn history_items_removed(&self) -> usize {
        self.purged.len() + self.reconciled.len()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted_snapshots.len()
    }
}

/// Purges expired snapshots and reconciles history with the provider.
pub struct PurgeEngine {
    provider: Arc<dyn CloudProvider>,
    history: Arc<dyn HistoryStore>,
}

impl PurgeEngine {
    pub fn new(provider: Arc<dyn CloudProvider>, history: Arc<dyn HistoryStore>) -> Self {
        Self { provider, history }
    }

    /// Run one pass for the provider's region.
    ///
    /// `live` is the set of snapshot IDs the provider currently reports. Fails only if the
    /// history scan fails; individual deletions are collected as failures.
    pub async fn purge(&self, live: &HashSet<String>, now: DateTime<Utc>) -> Result<PurgeOutcome> {
        let region = self.provider.region().to_string();
        let records = self.history.scan().await?;
        let candidates = PurgeCandidates::classify(&records, live, &region, now);

        let mut outcome = PurgeOutcome::default();
        if candidates.is_empty() {
            debug!(region = %region, "Nothing to purge");
            return Ok(outcome);
        }

        for snapshot_id in candidates.expired {
            match self.history.delete(&snapshot_id).await {
                Ok(()) => outcome.purged.push(snapshot_id),
                Err(e) => {
                    warn!(snapshot_id = %snapshot_id, error = %e, "Failed to delete history record");
                    outcome
                        .failures
                        .push(OperationFailure::new(&snapshot_id, Operation::DeleteHistory, &e));
                }
            }
        }

        for snapshot_id in candidates.drifted {
            match self.history.delete(&snapshot_id).await {
                Ok(()) => outcome.reconciled.push(snapshot_id),
                Err(e) => {
                    warn!(snapshot_id = %snapshot_id, error = %e, "Failed to delete history record");
                    outcome
                        .failures
                        .push(OperationFailure::new(&snapshot_id, Operation::DeleteHistory, &e));
                }
            }
        }

        if outcome.history_items_removed() > 0 {
            info!(
                region = %region,
                removed = outcome.history_items_removed(),
                "History updated"
            );
        }
        if !outcome.reconciled.is_empty() {
            info!(
                region = %region,
                count = outcome.reconciled.len(),
                snapshot_ids = ?outcome.reconciled,
                "Snapshots no longer exist, probably deleted manually or by another tool"
            );
        }

        for snapshot_id in &outcome.purged {
            match self.provider.delete_snapshot(snapshot_id).await {
                Ok(()) => outcome.deleted_snapshots.push(snapshot_id.clone()),
                Err(e) => {
                    warn!(snapshot_id = %snapshot_id, error = %e, "Failed to delete snapshot");
                    outcome
                        .failures
                        .push(OperationFailure::new(snapshot_id, Operation::DeleteSnapshot, &e));
                }
            }
        }

        if !outcome.deleted_snapshots.is_empty() {
            info!(
                region = %region,
                count = outcome.deleted_count(),
                snapshot_ids = ?outcome.deleted_snapshots,
                "Expired snapshots deleted"
            );
        }

        Ok(outcome)
    }
}
