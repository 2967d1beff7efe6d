//! Error types for SnapWarden.
//!
//! This module provides a unified error type [`SnapwardenError`] for all operations,
//! along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Schedule**: Time zones that cannot be normalized or resolved, malformed timestamps
//! - **Provider**: Snapshot, volume and tagging calls against a cloud region
//! - **History**: Reads and writes against the snapshot history store
//! - **Configuration**: Invalid settings or unreadable configuration files
//!
//! Per-resource failures never escape the core as errors. They are folded into
//! [`OperationFailure`](crate::snapshot::OperationFailure) values by the caller; only
//! region-level failures (listing instances, scanning history) surface as `Err`.
//!
//! # Example
//!
//! ```rust
//! use snapwarden::error::{Result, SnapwardenError};
//!
//! fn require_region(region: &str) -> Result<&str> {
//!     if region.is_empty() {
//!         return Err(SnapwardenError::InvalidArgument("region cannot be empty".into()));
//!     }
//!     Ok(region)
//! }
//!
//! assert!(require_region("").is_err());
//! ```

use std::io;
use thiserror::Error;

/// Main error type for SnapWarden operations.
#[derive(Error, Debug)]
pub enum SnapwardenError {
    // Schedule errors
    #[error("Invalid time zone: {0}")]
    InvalidTimeZone(String),

    #[error("Unknown time zone: {0}")]
    UnknownTimeZone(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    // Provider errors
    #[error("Region unavailable: {0}")]
    RegionUnavailable(String),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    // History errors
    #[error("History store error: {0}")]
    History(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // External errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for SnapwardenError {
    fn from(e: serde_json::Error) -> Self {
        SnapwardenError::Serialization(e.to_string())
    }
}

/// Result type alias for SnapWarden operations.
pub type Result<T> = std::result::Result<T, SnapwardenError>;
