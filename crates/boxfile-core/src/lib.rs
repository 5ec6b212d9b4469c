//! Core types and traits for boxfile.
//!
//! This crate provides the fundamental data structures shared by the
//! operation engine and the scanner: virtual paths that may point into a ZIP
//! archive, entry and tree types, error taxonomies, scan configuration and the
//! [`Filesystem`] primitive trait.

mod config;
mod entry;
mod error;
mod fs;
mod node;
mod path;

pub use config::{PROTECTED_DIRS, ScanConfig, ScanConfigBuilder};
pub use entry::{ArchiveEntry, DirEntry, DirEntryKind, EntryType, FileSystemEntry, to_utc};
pub use error::{OpError, ScanError};
pub use fs::{Filesystem, LocalFilesystem, is_cross_device};
pub use node::{DirTotals, ScanNode};
pub use path::{ARCHIVE_EXTENSION, VirtualPath, is_archive_name};
