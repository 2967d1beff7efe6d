//! Cloud provider boundary.
//!
//! The scheduler never talks to a cloud SDK directly. A [`RegionConnector`] enumerates regions
//! and hands out a [`CloudProvider`] scoped to one region; every call the core makes goes
//! through that trait.

pub mod memory;

pub use memory::{FailPoint, Inventory, MemoryCloud, MemoryProvider, ANY_TARGET};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;

/// A key/value resource tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A compute instance and its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    pub tags: Vec<Tag>,
}

impl Instance {
    /// Values of every tag whose key starts with `prefix`, in tag order.
    pub fn tag_values_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.tags
            .iter()
            .filter(move |t| t.key.starts_with(prefix))
            .map(|t| t.value.as_str())
    }
}

/// A block-storage volume attached to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub volume_id: String,
    /// Size in GiB.
    pub size: u64,
}

impl Volume {
    pub fn new(volume_id: impl Into<String>, size: u64) -> Self {
        Self {
            volume_id: volume_id.into(),
            size,
        }
    }
}

/// A snapshot accepted by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSnapshot {
    pub snapshot_id: String,
}

/// Region-scoped cloud operations.
#[async_trait::async_trait]
pub trait CloudProvider: Send + Sync {
    /// Region this provider is bound to.
    fn region(&self) -> &str;

    /// List all instances with their tags.
    async fn list_instances(&self) -> Result<Vec<Instance>>;

    /// List volumes attached to an instance.
    async fn list_attached_volumes(&self, instance_id: &str) -> Result<Vec<Volume>>;

    /// Request a snapshot of a volume.
    async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<CreatedSnapshot>;

    /// IDs of every snapshot owned by this account in the region.
    async fn list_existing_snapshot_ids(&self) -> Result<HashSet<String>>;

    /// Delete a snapshot.
    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;

    /// Apply one tag to a set of resources.
    async fn tag_resources(&self, resource_ids: &[String], key: &str, value: &str) -> Result<()>;
}

/// Enumerates regions and connects to them.
#[async_trait::async_trait]
pub trait RegionConnector: Send + Sync {
    /// List region names.
    async fn regions(&self) -> Result<Vec<String>>;

    /// Open a provider for one region.
    async fn connect(&self, region: &str) -> Result<Arc<dyn CloudProvider>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_prefix_match() {
        let instance = Instance {
            instance_id: "i-1".into(),
            tags: vec![
                Tag::new("Name", "web"),
                Tag::new("scheduler:ebs-snapshot", "default"),
                Tag::new("scheduler:ebs-snapshot:db", "0130;7"),
                Tag::new("scheduler", "ignored"),
            ],
        };
        let values: Vec<_> = instance
            .tag_values_with_prefix("scheduler:ebs-snapshot")
            .collect();
        assert_eq!(values, vec!["default", "0130;7"]);
    }
}
