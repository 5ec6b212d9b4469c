//! Scan progress reporting.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use boxfile_core::ScanNode;

/// A throttled snapshot of a running scan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    /// Directories entered so far.
    pub folders_scanned: u64,
    /// Bytes of readable files found so far.
    pub total_size: u64,
    /// Directory being entered when the snapshot was taken.
    pub current_path: PathBuf,
    /// Estimated completion, 0..=99 while running and 100 once finished.
    pub percentage: u8,
    /// The root and every subtree completed so far.
    pub tree: Vec<ScanNode>,
}

impl ScanProgress {
    /// Whether this is the final event of a completed scan.
    pub fn is_complete(&self) -> bool {
        self.percentage == 100
    }

    /// Root of the partial tree.
    pub fn root(&self) -> Option<&ScanNode> {
        self.tree.first()
    }
}

/// Receives progress snapshots. Invoked on the scanning task, so it should
/// return quickly.
pub type ProgressCallback = Arc<dyn Fn(&ScanProgress) + Send + Sync>;
