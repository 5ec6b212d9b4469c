//! Filesystem primitives.
//!
//! Everything that touches the real filesystem goes through [`Filesystem`], so
//! scans and operations can run against a test double that injects failures.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use compact_str::CompactString;

use crate::entry::{DirEntry, DirEntryKind, FileSystemEntry};

/// Async filesystem primitives used by the scanner and the operation engine.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// List the entries of a directory without stat'ing them.
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Stat a path, following symlinks.
    async fn stat(&self, path: &Path) -> io::Result<FileSystemEntry>;

    /// Read a whole file.
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Copy one file, returning the number of bytes copied.
    async fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64>;

    /// Atomically rename a file or directory.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory.
    async fn remove_dir(&self, path: &Path) -> io::Result<()>;

    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Whether the path exists (following symlinks).
    async fn exists(&self, path: &Path) -> bool {
        self.stat(path).await.is_ok()
    }
}

/// The real filesystem, via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut reader = tokio::fs::read_dir(path).await?;
        let mut entries = Vec::new();

        while let Some(entry) = reader.next_entry().await? {
            let kind = match entry.file_type().await {
                Ok(ft) if ft.is_dir() => DirEntryKind::Directory,
                Ok(ft) if ft.is_file() => DirEntryKind::File,
                _ => DirEntryKind::Other,
            };
            entries.push(DirEntry {
                name: CompactString::new(entry.file_name().to_string_lossy()),
                path: entry.path(),
                kind,
            });
        }

        Ok(entries)
    }

    async fn stat(&self, path: &Path) -> io::Result<FileSystemEntry> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(FileSystemEntry::from_metadata(path.to_path_buf(), &metadata))
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        tokio::fs::copy(from, to).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    async fn remove_dir(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_dir(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }
}

/// Whether an error means a rename cannot cross a filesystem/device boundary.
pub fn is_cross_device(error: &io::Error) -> bool {
    // EXDEV on unix, ERROR_NOT_SAME_DEVICE on Windows.
    const RAW_CODE: i32 = if cfg!(windows) { 17 } else { 18 };
    error.kind() == io::ErrorKind::CrossesDevices || error.raw_os_error() == Some(RAW_CODE)
}
