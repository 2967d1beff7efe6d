//! Command-line interface for SnapWarden.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::SchedulerConfig;

/// SnapWarden - Tag-driven volume snapshot scheduling.
#[derive(Parser)]
#[command(name = "snapwarden")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SNAPWARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the configuration file
    #[arg(short, long, env = "SNAPWARDEN_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a schedule tag value into a policy
    Parse {
        /// Tag value, e.g. "0600;7;us/eastern;weekdays"
        tag: String,
    },

    /// Check whether a schedule tag is due
    Check {
        /// Tag value
        tag: String,

        /// Instant to evaluate at (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// List snapshot history records
    History {
        /// Only show records of this region
        #[arg(short, long)]
        region: Option<String>,
    },

    /// Run a full scheduling pass against a simulated cloud
    Simulate {
        /// JSON inventory describing regions, instances and snapshots
        #[arg(short, long)]
        inventory: PathBuf,

        /// Instant to run at (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Show version information
    Version,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Apply command-line overrides to a loaded configuration.
    pub fn apply_overrides(&self, config: &mut SchedulerConfig) {
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}
