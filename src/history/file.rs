//! JSON file history store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::HistoryStore;
use crate::error::{Result, SnapwardenError};
use crate::snapshot::SnapshotRecord;

/// History store persisted as a JSON array of records.
///
/// Every mutation rewrites the whole file through a temporary file in the same directory,
/// so a crash mid-write leaves the previous contents intact.
pub struct JsonFileHistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileHistoryStore {
    /// Open a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, SnapshotRecord>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(SnapwardenError::History(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let records: Vec<SnapshotRecord> = serde_json::from_str(&content).map_err(|e| {
            SnapwardenError::History(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        Ok(records
            .into_iter()
            .map(|r| (r.snapshot_id.clone(), r))
            .collect())
    }

    async fn save(&self, records: &BTreeMap<String, SnapshotRecord>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).await?;

        let values: Vec<&SnapshotRecord> = records.values().collect();
        let serialized = serde_json::to_vec_pretty(&values)?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "history".to_string());
        let temp_path = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

        let mut file = File::create(&temp_path).await?;
        file.write_all(&serialized).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(SnapwardenError::History(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            )));
        }

        debug!(path = %self.path.display(), records = records.len(), "History file written");
        Ok(())
    }
}

#[async_trait::async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn scan(&self) -> Result<Vec<SnapshotRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_values().collect())
    }

    async fn put(&self, record: &SnapshotRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.insert(record.snapshot_id.clone(), record.clone());
        self.save(&records).await
    }

    async fn delete(&self, snapshot_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        if records.remove(snapshot_id).is_some() {
            self.save(&records).await?;
        }
        Ok(())
    }
}
