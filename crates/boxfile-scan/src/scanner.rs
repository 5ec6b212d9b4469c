//! Async directory size scanner with bounded concurrency.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, join_all};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Serialize, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use boxfile_core::{DirEntryKind, Filesystem, LocalFilesystem, ScanConfig, ScanError, ScanNode};

use crate::arena::{NodeId, ScanArena};
use crate::progress::{ProgressCallback, ScanProgress};

/// Lifecycle of a scanner instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Idle,
    Scanning,
    Completed,
    Cancelled,
    Failed,
}

/// Result of a completed scan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Always exactly one root node.
    pub tree: Vec<ScanNode>,
    pub total_size: u64,
    pub folders_scanned: u64,
    pub timestamp: DateTime<Utc>,
}

impl ScanReport {
    pub fn root(&self) -> Option<&ScanNode> {
        self.tree.first()
    }
}

/// How a scan ended.
#[derive(Debug)]
pub enum ScanOutcome {
    Completed(ScanReport),
    /// Stopped by [`TreeScanner::cancel`]; not an error.
    Cancelled,
    Failed(ScanError),
}

impl ScanOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn into_report(self) -> Option<ScanReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

impl Serialize for ScanOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Body<'a> {
            success: bool,
            operation: &'static str,
            #[serde(flatten)]
            report: Option<&'a ScanReport>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            diagnostic: Option<String>,
            #[serde(skip_serializing_if = "std::ops::Not::not")]
            cancelled: bool,
        }

        let body = match self {
            Self::Completed(report) => Body {
                success: true,
                operation: "scan",
                report: Some(report),
                error: None,
                diagnostic: None,
                cancelled: false,
            },
            Self::Cancelled => Body {
                success: false,
                operation: "scan",
                report: None,
                error: Some("Operation cancelled".to_string()),
                diagnostic: None,
                cancelled: true,
            },
            Self::Failed(error) => Body {
                success: false,
                operation: "scan",
                report: None,
                error: Some(error.to_string()),
                diagnostic: Some(format!("{error:?}")),
                cancelled: false,
            },
        };
        body.serialize(serializer)
    }
}

/// Marker returned up the recursion once the session is cancelled.
#[derive(Debug)]
struct Cancelled;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scans a directory tree and reports aggregate sizes per directory.
///
/// One scan runs per instance at a time. Progress goes to the callback set
/// with [`TreeScanner::set_progress_callback`].
pub struct TreeScanner {
    fs: Arc<dyn Filesystem>,
    token: Mutex<CancellationToken>,
    state: Mutex<ScanState>,
    running: AtomicBool,
    callback: Mutex<Option<ProgressCallback>>,
}

impl std::fmt::Debug for TreeScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeScanner")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Default for TreeScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeScanner {
    /// Create a scanner over the real filesystem.
    pub fn new() -> Self {
        Self::with_filesystem(Arc::new(LocalFilesystem::new()))
    }

    /// Create a scanner over a custom filesystem backend.
    pub fn with_filesystem(fs: Arc<dyn Filesystem>) -> Self {
        Self {
            fs,
            token: Mutex::new(CancellationToken::new()),
            state: Mutex::new(ScanState::Idle),
            running: AtomicBool::new(false),
            callback: Mutex::new(None),
        }
    }

    /// Receive throttled progress snapshots for subsequent scans.
    pub fn set_progress_callback<F>(&self, callback: F)
    where
        F: Fn(&ScanProgress) + Send + Sync + 'static,
    {
        *lock(&self.callback) = Some(Arc::new(callback));
    }

    pub fn clear_progress_callback(&self) {
        *lock(&self.callback) = None;
    }

    /// Cancel the running scan. No progress is reported after this returns.
    pub fn cancel(&self) {
        lock(&self.token).cancel();
        info!("scan cancellation requested");
    }

    /// Replace the cancellation token with a fresh one. Runs at the start of
    /// every scan, so a cancel issued before `scan` has no effect on it.
    pub fn reset_cancellation(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *lock(&self.token) = token.clone();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.token).is_cancelled()
    }

    pub fn state(&self) -> ScanState {
        *lock(&self.state)
    }

    fn set_state(&self, state: ScanState) {
        *lock(&self.state) = state;
    }

    /// Scan `config.root`.
    ///
    /// Unreadable files and directories are skipped; only an invalid root
    /// fails the whole scan.
    pub async fn scan(&self, config: &ScanConfig) -> ScanOutcome {
        if self.running.swap(true, Ordering::AcqRel) {
            return ScanOutcome::Failed(ScanError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        let token = self.reset_cancellation();
        self.set_state(ScanState::Scanning);

        let outcome = self.run(config, token).await;
        self.set_state(match &outcome {
            ScanOutcome::Completed(_) => ScanState::Completed,
            ScanOutcome::Cancelled => ScanState::Cancelled,
            ScanOutcome::Failed(_) => ScanState::Failed,
        });
        outcome
    }

    async fn run(&self, config: &ScanConfig, token: CancellationToken) -> ScanOutcome {
        let root = match std::path::absolute(&config.root) {
            Ok(root) => root,
            Err(e) => return ScanOutcome::Failed(ScanError::io(&config.root, e)),
        };

        match self.fs.stat(&root).await {
            Ok(meta) if meta.is_directory => {}
            Ok(_) => return ScanOutcome::Failed(ScanError::NotADirectory { path: root }),
            Err(e) => return ScanOutcome::Failed(ScanError::io(&root, e)),
        }

        let start = Instant::now();
        info!(root = %root.display(), "scan started");

        let session = Session {
            fs: Arc::clone(&self.fs),
            config,
            token,
            arena: Mutex::new(ScanArena::new()),
            folders_scanned: AtomicU64::new(0),
            total_size: AtomicU64::new(0),
            last_emit: Mutex::new(None),
            callback: lock(&self.callback).clone(),
        };

        let root_id = match session.scan_dir(root.clone(), 0).await {
            Ok(id) if !session.token.is_cancelled() => id,
            _ => {
                info!(root = %root.display(), elapsed = ?start.elapsed(), "scan cancelled");
                return ScanOutcome::Cancelled;
            }
        };

        let tree = lock(&session.arena).materialize(root_id);
        let report = ScanReport {
            tree: vec![tree],
            total_size: session.total_size.load(Ordering::Acquire),
            folders_scanned: session.folders_scanned.load(Ordering::Acquire),
            timestamp: Utc::now(),
        };

        info!(
            root = %root.display(),
            folders = report.folders_scanned,
            bytes = report.total_size,
            elapsed = ?start.elapsed(),
            "scan completed"
        );

        session.emit_final(&root, &report);
        ScanOutcome::Completed(report)
    }
}

/// Clears the running flag even if the scan future is dropped.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State of a single scan invocation.
struct Session<'a> {
    fs: Arc<dyn Filesystem>,
    config: &'a ScanConfig,
    token: CancellationToken,
    arena: Mutex<ScanArena>,
    folders_scanned: AtomicU64,
    total_size: AtomicU64,
    last_emit: Mutex<Option<Instant>>,
    callback: Option<ProgressCallback>,
}

impl Session<'_> {
    fn check(&self) -> Result<(), Cancelled> {
        if self.token.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Scan one directory and everything below it, returning its arena id.
    ///
    /// A directory that cannot be listed yields an empty node.
    fn scan_dir(&self, path: PathBuf, depth: u32) -> BoxFuture<'_, Result<NodeId, Cancelled>> {
        Box::pin(async move {
            self.check()?;

            let id = lock(&self.arena).insert(&path, depth);
            self.folders_scanned.fetch_add(1, Ordering::AcqRel);
            self.emit_progress(&path);

            let entries = match self.fs.read_dir(&path).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unable to read directory");
                    return Ok(id);
                }
            };
            self.check()?;

            let mut files = Vec::new();
            let mut dirs = Vec::new();
            for entry in entries {
                match entry.kind {
                    DirEntryKind::Directory if self.config.should_skip_dir(&entry.name) => {
                        debug!(path = %entry.path.display(), "skipping protected directory");
                    }
                    DirEntryKind::Directory => dirs.push(entry.path),
                    DirEntryKind::File => files.push(entry.path),
                    DirEntryKind::Other => {}
                }
            }

            for batch in files.chunks(self.config.file_batch_size.max(1)) {
                self.check()?;
                let stats = join_all(batch.iter().map(|file| self.fs.stat(file))).await;

                let mut bytes = 0;
                let mut count = 0;
                for (file, stat) in batch.iter().zip(stats) {
                    match stat {
                        Ok(meta) => {
                            bytes += meta.size;
                            count += 1;
                        }
                        Err(e) => {
                            warn!(path = %file.display(), error = %e, "unable to stat file");
                        }
                    }
                }
                self.total_size.fetch_add(bytes, Ordering::AcqRel);
                lock(&self.arena).add_files(id, bytes, count);
            }
            self.check()?;

            for batch in dirs.chunks(self.config.dir_batch_size.max(1)) {
                self.check()?;
                let mut pending: FuturesUnordered<_> = batch
                    .iter()
                    .map(|dir| self.scan_dir(dir.clone(), depth + 1))
                    .collect();
                while let Some(child) = pending.next().await {
                    let child = child?;
                    lock(&self.arena).link(id, child);
                }
            }

            Ok(id)
        })
    }

    /// Emit a throttled snapshot. Nothing is emitted once cancelled.
    fn emit_progress(&self, current: &Path) {
        let Some(callback) = &self.callback else {
            return;
        };

        let mut last = lock(&self.last_emit);
        if self.token.is_cancelled() {
            return;
        }
        let now = Instant::now();
        if last.is_some_and(|at| now.duration_since(at) < self.config.progress_interval()) {
            return;
        }
        *last = Some(now);

        let folders_scanned = self.folders_scanned.load(Ordering::Acquire);
        let progress = ScanProgress {
            folders_scanned,
            total_size: self.total_size.load(Ordering::Acquire),
            current_path: current.to_path_buf(),
            percentage: self.config.estimate_percentage(folders_scanned),
            tree: vec![lock(&self.arena).materialize(NodeId::ROOT)],
        };
        callback(&progress);
    }

    fn emit_final(&self, root: &Path, report: &ScanReport) {
        if let Some(callback) = &self.callback {
            callback(&ScanProgress {
                folders_scanned: report.folders_scanned,
                total_size: report.total_size,
                current_path: root.to_path_buf(),
                percentage: 100,
                tree: report.tree.clone(),
            });
        }
    }
}
