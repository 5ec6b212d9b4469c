//! Disk access for the operation engine.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use boxfile_core::{EntryType, FileSystemEntry, Filesystem, LocalFilesystem, OpError};

/// Totals of a recursive copy or delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReport {
    /// Files copied or removed.
    pub files: u64,
    /// Bytes copied.
    pub bytes: u64,
    /// Entries skipped after a per-entry failure.
    pub skipped: u64,
}

impl TransferReport {
    /// Whether every entry was handled.
    pub fn is_complete(&self) -> bool {
        self.skipped == 0
    }
}

/// Contents of a disk directory, split by kind.
#[derive(Debug, Clone, Default)]
pub struct DiskListing {
    /// Number of raw directory entries, including ones that could not be stat'ed.
    pub total_items: usize,
    pub directories: Vec<FileSystemEntry>,
    pub files: Vec<FileSystemEntry>,
}

/// Filesystem operations over a pluggable [`Filesystem`] backend.
#[derive(Clone)]
pub struct FileSystemAccessor {
    pub(crate) fs: Arc<dyn Filesystem>,
}

impl fmt::Debug for FileSystemAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemAccessor").finish_non_exhaustive()
    }
}

impl Default for FileSystemAccessor {
    fn default() -> Self {
        Self::local()
    }
}

impl FileSystemAccessor {
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self { fs }
    }

    /// Accessor over the real filesystem.
    pub fn local() -> Self {
        Self::new(Arc::new(LocalFilesystem::new()))
    }

    /// The underlying backend.
    pub fn filesystem(&self) -> &Arc<dyn Filesystem> {
        &self.fs
    }

    /// Stat a path.
    pub async fn stat(&self, path: &Path) -> Result<FileSystemEntry, OpError> {
        self.fs.stat(path).await.map_err(|e| OpError::io(path, e))
    }

    /// List a directory. Entries that cannot be stat'ed are skipped but still
    /// counted in `total_items`.
    pub async fn list(&self, dir: &Path) -> Result<DiskListing, OpError> {
        let meta = self.stat(dir).await?;
        if !meta.is_directory {
            return Err(OpError::type_mismatch(dir, EntryType::Directory));
        }

        let entries = self.fs.read_dir(dir).await.map_err(|e| OpError::io(dir, e))?;
        let mut listing = DiskListing {
            total_items: entries.len(),
            ..Default::default()
        };

        for entry in entries {
            match self.fs.stat(&entry.path).await {
                Ok(stat) if entry.is_dir() => listing.directories.push(stat),
                Ok(stat) => listing.files.push(stat),
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "unable to access entry, skipping");
                }
            }
        }

        debug!(
            path = %dir.display(),
            directories = listing.directories.len(),
            files = listing.files.len(),
            "listed directory"
        );
        Ok(listing)
    }

    /// Read a whole file.
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, OpError> {
        let meta = self.stat(path).await?;
        if meta.is_directory {
            return Err(OpError::type_mismatch(path, EntryType::File));
        }
        self.fs.read(path).await.map_err(|e| OpError::io(path, e))
    }

    /// Create a directory and its parents.
    pub async fn mkdir(&self, path: &Path) -> Result<(), OpError> {
        self.fs
            .create_dir_all(path)
            .await
            .map_err(|e| OpError::io(path, e))
    }

    /// Create the parent directory of `path` if it has one.
    pub async fn create_parent(&self, path: &Path) -> Result<(), OpError> {
        match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => self.mkdir(parent).await,
            None => Ok(()),
        }
    }

    pub async fn remove_file(&self, path: &Path) -> Result<(), OpError> {
        self.fs
            .remove_file(path)
            .await
            .map_err(|e| OpError::io(path, e))
    }

    /// Recursively delete a directory, skipping entries that fail.
    ///
    /// Only a failure to list `path` itself aborts the call.
    pub async fn remove_dir_all(&self, path: &Path) -> Result<TransferReport, OpError> {
        let mut report = TransferReport::default();
        let mut dirs = Vec::new();
        let mut pending = vec![path.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let entries = match self.fs.read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if dir.as_path() == path => return Err(OpError::io(path, e)),
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "unable to read directory, skipping");
                    report.skipped += 1;
                    continue;
                }
            };

            for entry in entries {
                if entry.is_dir() {
                    pending.push(entry.path);
                } else if let Err(e) = self.fs.remove_file(&entry.path).await {
                    warn!(path = %entry.path.display(), error = %e, "unable to remove file, skipping");
                    report.skipped += 1;
                } else {
                    report.files += 1;
                }
            }
            dirs.push(dir);
        }

        // Pre-order reversed puts every child before its parent.
        for dir in dirs.iter().rev() {
            if let Err(e) = self.fs.remove_dir(dir).await {
                warn!(path = %dir.display(), error = %e, "unable to remove directory, skipping");
                report.skipped += 1;
            }
        }

        Ok(report)
    }
}
