//! Common test utilities for integration tests.

pub mod fixtures;

use std::path::PathBuf;
use tempfile::TempDir;

pub use fixtures::*;

/// Test environment holding a temporary history file location.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub history_path: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let history_path = temp_dir.path().join("state").join("history.json");
        std::fs::create_dir_all(history_path.parent().unwrap())
            .expect("Failed to create history dir");

        Self {
            temp_dir,
            history_path,
        }
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
