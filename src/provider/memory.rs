//! In-memory cloud provider.
//!
//! Used by tests and by the `simulate` command. Regions, instances and snapshots live in
//! memory; failures can be injected per operation and target to exercise the
//! collect-and-continue paths.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CloudProvider, CreatedSnapshot, Instance, RegionConnector, Tag, Volume};
use crate::error::{Result, SnapwardenError};

/// Target that matches every resource for an injected failure.
pub const ANY_TARGET: &str = "*";

/// Provider operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ListInstances,
    ListVolumes,
    CreateSnapshot,
    ListSnapshots,
    DeleteSnapshot,
    TagResources,
}

#[derive(Debug, Clone)]
struct StoredInstance {
    tags: Vec<Tag>,
    volumes: Vec<Volume>,
}

#[derive(Debug, Clone)]
struct StoredSnapshot {
    volume_id: Option<String>,
    description: String,
    tags: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct RegionState {
    instances: BTreeMap<String, StoredInstance>,
    snapshots: BTreeMap<String, StoredSnapshot>,
    failures: HashSet<(FailPoint, String)>,
}

impl RegionState {
    fn check(&self, point: FailPoint, target: &str) -> Result<()> {
        if self.failures.contains(&(point, target.to_string()))
            || self.failures.contains(&(point, ANY_TARGET.to_string()))
        {
            return Err(SnapwardenError::Provider(format!(
                "injected {:?} failure for {}",
                point, target
            )));
        }
        Ok(())
    }
}

/// Single-region in-memory provider.
pub struct MemoryProvider {
    region: String,
    state: RwLock<RegionState>,
}

impl MemoryProvider {
    /// Create an empty region.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            state: RwLock::new(RegionState::default()),
        }
    }

    /// Add an instance with tags and attached volumes.
    pub async fn add_instance(&self, instance_id: &str, tags: Vec<Tag>, volumes: Vec<Volume>) {
        let mut state = self.state.write().await;
        state
            .instances
            .insert(instance_id.to_string(), StoredInstance { tags, volumes });
    }

    /// Add a pre-existing snapshot not created by the scheduler.
    pub async fn add_snapshot(&self, snapshot_id: &str) {
        let mut state = self.state.write().await;
        state.snapshots.insert(
            snapshot_id.to_string(),
            StoredSnapshot {
                volume_id: None,
                description: String::new(),
                tags: HashMap::new(),
            },
        );
    }

    /// Remove a snapshot out-of-band, bypassing the scheduler.
    pub async fn remove_snapshot(&self, snapshot_id: &str) -> bool {
        let mut state = self.state.write().await;
        state.snapshots.remove(snapshot_id).is_some()
    }

    /// Make `point` fail for `target` (or every target with [`ANY_TARGET`]).
    pub async fn inject_failure(&self, point: FailPoint, target: &str) {
        let mut state = self.state.write().await;
        state.failures.insert((point, target.to_string()));
    }

    /// Remove all injected failures.
    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    /// IDs of every snapshot currently in the region, sorted.
    pub async fn snapshot_ids(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.snapshots.keys().cloned().collect()
    }

    /// Tags applied to a snapshot.
    pub async fn snapshot_tags(&self, snapshot_id: &str) -> Option<HashMap<String, String>> {
        let state = self.state.read().await;
        state.snapshots.get(snapshot_id).map(|s| s.tags.clone())
    }

    /// Description of a snapshot.
    pub async fn snapshot_description(&self, snapshot_id: &str) -> Option<String> {
        let state = self.state.read().await;
        state.snapshots.get(snapshot_id).map(|s| s.description.clone())
    }

    /// Snapshot IDs taken of a volume.
    pub async fn snapshots_of_volume(&self, volume_id: &str) -> Vec<String> {
        let state = self.state.read().await;
        state
            .snapshots
            .iter()
            .filter(|(_, s)| s.volume_id.as_deref() == Some(volume_id))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl CloudProvider for MemoryProvider {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_instances(&self) -> Result<Vec<Instance>> {
        let state = self.state.read().await;
        state.check(FailPoint::ListInstances, &self.region)?;
        Ok(state
            .instances
            .iter()
            .map(|(id, stored)| Instance {
                instance_id: id.clone(),
                tags: stored.tags.clone(),
            })
            .collect())
    }

    async fn list_attached_volumes(&self, instance_id: &str) -> Result<Vec<Volume>> {
        let state = self.state.read().await;
        state.check(FailPoint::ListVolumes, instance_id)?;
        state
            .instances
            .get(instance_id)
            .map(|i| i.volumes.clone())
            .ok_or_else(|| SnapwardenError::InstanceNotFound(instance_id.to_string()))
    }

    async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<CreatedSnapshot> {
        let mut state = self.state.write().await;
        state.check(FailPoint::CreateSnapshot, volume_id)?;

        let hex = Uuid::new_v4().simple().to_string();
        let snapshot_id = format!("snap-{}", &hex[..17]);
        state.snapshots.insert(
            snapshot_id.clone(),
            StoredSnapshot {
                volume_id: Some(volume_id.to_string()),
                description: description.to_string(),
                tags: HashMap::new(),
            },
        );
        Ok(CreatedSnapshot { snapshot_id })
    }

    async fn list_existing_snapshot_ids(&self) -> Result<HashSet<String>> {
        let state = self.state.read().await;
        state.check(FailPoint::ListSnapshots, &self.region)?;
        Ok(state.snapshots.keys().cloned().collect())
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.check(FailPoint::DeleteSnapshot, snapshot_id)?;
        state
            .snapshots
            .remove(snapshot_id)
            .map(|_| ())
            .ok_or_else(|| SnapwardenError::SnapshotNotFound(snapshot_id.to_string()))
    }

    async fn tag_resources(&self, resource_ids: &[String], key: &str, value: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.check(FailPoint::TagResources, &self.region)?;
        if let Some(missing) = resource_ids
            .iter()
            .find(|id| !state.snapshots.contains_key(id.as_str()))
        {
            return Err(SnapwardenError::SnapshotNotFound(missing.clone()));
        }
        for id in resource_ids {
            if let Some(snapshot) = state.snapshots.get_mut(id) {
                snapshot.tags.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }
}

/// Multi-region in-memory cloud.
#[derive(Default)]
pub struct MemoryCloud {
    regions: RwLock<BTreeMap<String, Arc<MemoryProvider>>>,
    unavailable: RwLock<HashSet<String>>,
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a region, or return the existing one.
    pub async fn add_region(&self, region: &str) -> Arc<MemoryProvider> {
        let mut regions = self.regions.write().await;
        regions
            .entry(region.to_string())
            .or_insert_with(|| Arc::new(MemoryProvider::new(region)))
            .clone()
    }

    /// Get a region's provider.
    pub async fn region(&self, region: &str) -> Option<Arc<MemoryProvider>> {
        self.regions.read().await.get(region).cloned()
    }

    /// Make connections to a region fail.
    pub async fn mark_unavailable(&self, region: &str) {
        self.unavailable.write().await.insert(region.to_string());
    }

    /// Build a cloud from an inventory description.
    pub async fn from_inventory(inventory: &Inventory) -> Self {
        let cloud = Self::new();
        for (name, region) in &inventory.regions {
            let provider = cloud.add_region(name).await;
            for instance in &region.instances {
                let tags = instance
                    .tags
                    .iter()
                    .map(|(k, v)| Tag::new(k.clone(), v.clone()))
                    .collect();
                provider
                    .add_instance(&instance.instance_id, tags, instance.volumes.clone())
                    .await;
            }
            for snapshot_id in &region.snapshots {
                provider.add_snapshot(snapshot_id).await;
            }
        }
        cloud
    }
}

#[async_trait::async_trait]
impl RegionConnector for MemoryCloud {
    async fn regions(&self) -> Result<Vec<String>> {
        Ok(self.regions.read().await.keys().cloned().collect())
    }

    async fn connect(&self, region: &str) -> Result<Arc<dyn CloudProvider>> {
        if self.unavailable.read().await.contains(region) {
            return Err(SnapwardenError::RegionUnavailable(region.to_string()));
        }
        let provider = self
            .region(region)
            .await
            .ok_or_else(|| SnapwardenError::RegionUnavailable(region.to_string()))?;
        Ok(provider as Arc<dyn CloudProvider>)
    }
}

/// JSON description of a simulated cloud.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub regions: BTreeMap<String, RegionInventory>,
}

/// Instances and existing snapshots of one simulated region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionInventory {
    #[serde(default)]
    pub instances: Vec<InstanceInventory>,
    /// Snapshots that already exist in the region.
    #[serde(default)]
    pub snapshots: Vec<String>,
}

/// One simulated instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceInventory {
    pub instance_id: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
}

impl Inventory {
    /// Load an inventory from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
