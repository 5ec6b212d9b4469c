//! Error types for file operations and scanning.

use std::path::PathBuf;

use thiserror::Error;

use crate::entry::EntryType;

/// Errors that abort a whole file or archive operation.
///
/// Per-entry failures inside bulk operations are logged and skipped instead of
/// being returned.
#[derive(Debug, Error)]
pub enum OpError {
    /// Container missing or not a `.zip` file.
    #[error("archive does not exist: {path}")]
    ArchiveNotFound { path: PathBuf },

    /// Entry missing inside an existing archive.
    #[error("entry not found in {container}: {entry}")]
    EntryNotFound { container: PathBuf, entry: String },

    /// Disk source or target missing.
    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    /// Expected a file and got a directory, or the other way round.
    #[error("expected a {expected}: {path}")]
    TypeMismatch { path: PathBuf, expected: EntryType },

    /// Permission denied or file locked.
    #[error("permission denied or locked: {path}")]
    PermissionOrLock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Request is malformed or unsupported.
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// A non-transactional transfer stopped with some entries skipped; the
    /// partially written destination is left in place.
    #[error("transfer to {destination} incomplete: {skipped} entries skipped")]
    PartialTransfer { destination: PathBuf, skipped: u64 },

    /// Malformed archive or ZIP library failure.
    #[error("archive error in {path}: {message}")]
    Archive { path: PathBuf, message: String },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unclassified failure.
    #[error("{message}")]
    Unknown { message: String },
}

impl OpError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::PathNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionOrLock { path, source },
            _ => Self::Io { path, source },
        }
    }

    /// Create an invalid parameter error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(path: impl Into<PathBuf>, expected: EntryType) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected,
        }
    }
}

/// Errors that abort a whole scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The scanner is already running a session.
    #[error("A scan is already in progress")]
    AlreadyRunning,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}
