//! SnapWarden - Tag-driven volume snapshot scheduling.
//!
//! SnapWarden reads a schedule tag on each compute instance, decides whether the instance's
//! snapshot window is open, snapshots its attached volumes and keeps a history of every
//! snapshot with its purge deadline. Expired snapshots are deleted and history records whose
//! snapshot has vanished are reconciled away.
//!
//! # Features
//!
//! - **Schedule Grammar**: `start;retention;zone;days` tag values with fallbacks to defaults.
//! - **Time Zones**: Lenient zone normalization resolved against the IANA database.
//! - **Windowed Evaluation**: A policy is due when its start time fell inside the last interval.
//! - **Lifecycle History**: Every snapshot is recorded with a purge deadline or `NA`.
//! - **Purge & Reconciliation**: Expired and orphaned history is cleaned up per region.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SnapWarden                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scheduler: Region loop | Due selection | Run report         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Schedule: Tag grammar | Time zones | Window evaluation      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Snapshot: Lifecycle recorder | Purge engine                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Ports: CloudProvider | RegionConnector | HistoryStore       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use snapwarden::config::SchedulerConfig;
//! use snapwarden::provider::MemoryCloud;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> snapwarden::Result<()> {
//!     let config = SchedulerConfig::development();
//!     let cloud = Arc::new(MemoryCloud::new());
//!
//!     let report = snapwarden::run(config, cloud).await?;
//!     println!("{}", report.metrics_payload());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;

pub mod history;
pub mod provider;
pub mod schedule;
pub mod scheduler;
pub mod snapshot;

pub mod cli;
pub mod observability;

// Re-exports
pub use error::{Result, SnapwardenError};
pub use scheduler::{RegionReport, RunReport, SnapshotScheduler};

use chrono::Utc;
use config::SchedulerConfig;
use history::JsonFileHistoryStore;
use provider::RegionConnector;
use std::sync::Arc;
use tracing::info;

/// Run one scheduling pass now, keeping history in the configured file.
pub async fn run(config: SchedulerConfig, connector: Arc<dyn RegionConnector>) -> Result<RunReport> {
    if let Some(dir) = config.history.path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let history = Arc::new(JsonFileHistoryStore::new(config.history.path.clone()));
    info!(history = %config.history.path.display(), "Starting SnapWarden run");

    let scheduler = SnapshotScheduler::new(config, connector, history)?;
    scheduler.run(Utc::now()).await
}
