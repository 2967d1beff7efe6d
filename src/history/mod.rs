//! Snapshot history store.
//!
//! The history store is the only durable state the scheduler owns: one
//! [`SnapshotRecord`] per snapshot it created, keyed by snapshot ID. It has no secondary
//! indices; callers scan everything and filter by region in memory.

mod file;

pub use file::JsonFileHistoryStore;

use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::snapshot::SnapshotRecord;

/// Trait for snapshot history backends.
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Return every record.
    async fn scan(&self) -> Result<Vec<SnapshotRecord>>;

    /// Insert or replace a record.
    async fn put(&self, record: &SnapshotRecord) -> Result<()>;

    /// Delete a record. Deleting a missing key is not an error.
    async fn delete(&self, snapshot_id: &str) -> Result<()>;
}

/// In-memory history store.
pub struct MemoryHistoryStore {
    records: RwLock<HashMap<String, SnapshotRecord>>,
}

impl MemoryHistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a single record.
    pub async fn get(&self, snapshot_id: &str) -> Option<SnapshotRecord> {
        self.records.read().await.get(snapshot_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn scan(&self) -> Result<Vec<SnapshotRecord>> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }

    async fn put(&self, record: &SnapshotRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.snapshot_id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, snapshot_id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        records.remove(snapshot_id);
        Ok(())
    }
}
