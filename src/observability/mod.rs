//! Observability module for SnapWarden.
//!
//! Provides logging and run metrics.

use crate::config::ObservabilityConfig;
use crate::error::{Result, SnapwardenError};
use crate::scheduler::RegionReport;
use metrics::counter;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| SnapwardenError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| SnapwardenError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!("Observability initialized");
    Ok(())
}

/// Record the counters for one completed region pass.
pub fn record_region_report(report: &RegionReport) {
    let region = report.region.clone();

    counter!("snapwarden_snapshots_created_total", "region" => region.clone())
        .increment(report.snapshots_created() as u64);
    counter!("snapwarden_snapshots_deleted_total", "region" => region.clone())
        .increment(report.snapshots_deleted as u64);
    counter!("snapwarden_history_removed_total", "region" => region.clone())
        .increment(report.history_items_removed as u64);
    counter!("snapwarden_reconciled_total", "region" => region.clone())
        .increment(report.reconciled as u64);
    counter!("snapwarden_operation_failures_total", "region" => region)
        .increment(report.failures.len() as u64);
}

/// Record a region whose pass was aborted.
pub fn record_region_failure(region: &str) {
    counter!("snapwarden_region_failures_total", "region" => region.to_string()).increment(1);
}
