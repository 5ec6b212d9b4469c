//! Entry types returned by listings and stats.

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Whether an operation acted on a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// Raw kind of a directory entry, as reported by the directory listing
/// (without following symlinks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirEntryKind {
    File,
    Directory,
    /// Symlinks, sockets, devices.
    Other,
}

/// A name returned by listing a directory, before any stat call.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: CompactString,
    pub path: PathBuf,
    pub kind: DirEntryKind,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == DirEntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == DirEntryKind::File
    }
}

/// A stat'ed entry on the real filesystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemEntry {
    pub name: CompactString,
    pub path: PathBuf,
    pub size: u64,
    /// Creation time (platform-dependent).
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub is_directory: bool,
    pub is_file: bool,
}

impl FileSystemEntry {
    /// Build an entry from std metadata.
    pub fn from_metadata(path: PathBuf, metadata: &std::fs::Metadata) -> Self {
        let name = path
            .file_name()
            .map(|n| CompactString::new(n.to_string_lossy()))
            .unwrap_or_else(|| CompactString::new(path.to_string_lossy()));

        Self {
            name,
            size: metadata.len(),
            created: metadata.created().ok().map(to_utc),
            modified: metadata.modified().ok().map(to_utc),
            is_directory: metadata.is_dir(),
            is_file: metadata.is_file(),
            path,
        }
    }

    pub fn entry_type(&self) -> EntryType {
        if self.is_directory {
            EntryType::Directory
        } else {
            EntryType::File
        }
    }
}

/// One entry inside a ZIP container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    /// Last path component.
    pub name: CompactString,
    /// Full forward-slash path inside the archive.
    pub internal_path: String,
    /// Uncompressed size; 0 for directories.
    pub size: u64,
    pub is_directory: bool,
    /// Local time stored in the archive, if any.
    pub modified: Option<NaiveDateTime>,
}

impl ArchiveEntry {
    pub fn entry_type(&self) -> EntryType {
        if self.is_directory {
            EntryType::Directory
        } else {
            EntryType::File
        }
    }
}

/// Convert a `SystemTime` to a UTC timestamp.
pub fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}
