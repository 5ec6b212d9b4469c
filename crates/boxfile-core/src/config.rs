//! Scan configuration types.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Directory names that are never descended into.
pub const PROTECTED_DIRS: &[&str] = &[
    "$Recycle.Bin",
    "$RECYCLE.BIN",
    "System Volume Information",
    "$WinREAgent",
    "$SysReset",
];

/// Configuration for scanning operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Files stat'ed concurrently per batch.
    #[builder(default = "100")]
    #[serde(default = "default_file_batch_size")]
    pub file_batch_size: usize,

    /// Subdirectories scanned concurrently per batch.
    #[builder(default = "10")]
    #[serde(default = "default_dir_batch_size")]
    pub dir_batch_size: usize,

    /// Minimum time between two progress events, in milliseconds.
    #[builder(default = "100")]
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Folder count treated as "100%" by the progress estimate.
    #[builder(default = "1000")]
    #[serde(default = "default_folder_estimate")]
    pub folder_estimate: u64,

    /// Directory names to skip.
    #[builder(default = "default_skip_dirs()")]
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,
}

fn default_file_batch_size() -> usize {
    100
}

fn default_dir_batch_size() -> usize {
    10
}

fn default_progress_interval_ms() -> u64 {
    100
}

fn default_folder_estimate() -> u64 {
    1000
}

fn default_skip_dirs() -> Vec<String> {
    PROTECTED_DIRS.iter().map(|s| s.to_string()).collect()
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        if self.file_batch_size == Some(0) || self.dir_batch_size == Some(0) {
            return Err("Batch sizes must be greater than zero".to_string());
        }
        if self.folder_estimate == Some(0) {
            return Err("Folder estimate must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file_batch_size: default_file_batch_size(),
            dir_batch_size: default_dir_batch_size(),
            progress_interval_ms: default_progress_interval_ms(),
            folder_estimate: default_folder_estimate(),
            skip_dirs: default_skip_dirs(),
        }
    }

    /// Check if a directory should be skipped.
    pub fn should_skip_dir(&self, name: &str) -> bool {
        self.skip_dirs.iter().any(|d| d == name)
    }

    /// Throttle interval for progress events.
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Estimated completion percentage, capped at 99 until the scan finishes.
    pub fn estimate_percentage(&self, folders_scanned: u64) -> u8 {
        let estimate = self.folder_estimate.max(1) as f64;
        let pct = (folders_scanned as f64 / estimate * 100.0).round();
        pct.min(99.0) as u8
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
