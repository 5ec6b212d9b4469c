//! Structured operation results.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use boxfile_core::{ArchiveEntry, EntryType, FileSystemEntry, OpError};

/// A listed item from either a disk directory or an archive.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ListedEntry {
    Disk(FileSystemEntry),
    Archive(ArchiveEntry),
}

impl ListedEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Disk(e) => &e.name,
            Self::Archive(e) => &e.name,
        }
    }

    pub fn is_directory(&self) -> bool {
        match self {
            Self::Disk(e) => e.is_directory,
            Self::Archive(e) => e.is_directory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    pub total_files: usize,
    pub total_directories: usize,
}

/// Result of `list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub path: String,
    pub total_items: usize,
    pub directories: Vec<ListedEntry>,
    pub files: Vec<ListedEntry>,
    pub summary: ListSummary,
}

impl Listing {
    pub fn new(
        path: impl Into<String>,
        total_items: usize,
        directories: Vec<ListedEntry>,
        files: Vec<ListedEntry>,
    ) -> Self {
        let summary = ListSummary {
            total_files: files.len(),
            total_directories: directories.len(),
        };
        Self {
            path: path.into(),
            total_items,
            directories,
            files,
            summary,
        }
    }
}

/// Result of `read`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub path: String,
    /// Text, or a `data:` URL for images.
    pub content: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub is_image: bool,
}

/// Result of `copy` and `move`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub source: String,
    pub destination: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub timestamp: DateTime<Utc>,
    /// Entries skipped by a recursive copy.
    #[serde(skip_serializing_if = "is_zero")]
    pub skipped: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl Transfer {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        entry_type: EntryType,
        size: Option<u64>,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            entry_type,
            size,
            timestamp: Utc::now(),
            skipped: 0,
        }
    }
}

/// A filesystem root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drive {
    pub letter: String,
    pub path: String,
    pub label: String,
}

/// Result of `drives`.
#[derive(Debug, Clone, Serialize)]
pub struct DriveList {
    pub drives: Vec<Drive>,
}

/// Payload of a successful operation, tagged with the operation name.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum Outcome {
    List(Listing),
    Read(FileContent),
    Copy(Transfer),
    Move(Transfer),
    Drives(DriveList),
}

/// A whole-operation failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFailure {
    pub operation: String,
    /// Display form of the error.
    pub error: String,
    /// Debug form of the error, including its source chain.
    pub diagnostic: String,
}

impl OperationFailure {
    pub fn from_error(operation: impl Into<String>, error: &OpError) -> Self {
        Self {
            operation: operation.into(),
            error: error.to_string(),
            diagnostic: format!("{error:?}"),
        }
    }
}

/// Outcome of [`crate::OperationExecutor::execute`].
///
/// Serializes as `{"success": true, "operation": ..., ...}` or
/// `{"success": false, "operation": ..., "error": ..., "diagnostic": ...}`.
#[derive(Debug, Clone)]
pub enum OperationResult {
    Success(Outcome),
    Failure(OperationFailure),
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Self::Success(outcome) => Some(outcome),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&OperationFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

impl Serialize for OperationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a, T: Serialize> {
            success: bool,
            #[serde(flatten)]
            body: &'a T,
        }

        match self {
            Self::Success(outcome) => Tagged {
                success: true,
                body: outcome,
            }
            .serialize(serializer),
            Self::Failure(failure) => Tagged {
                success: false,
                body: failure,
            }
            .serialize(serializer),
        }
    }
}
