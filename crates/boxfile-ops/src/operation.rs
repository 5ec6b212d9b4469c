//! File operation requests.

use serde::{Deserialize, Serialize};

/// A request for the operation executor.
///
/// Paths are virtual: either a disk path or `<container>.zip/<internal path>`.
/// Deserializes from `{"operation": "copy", "source": ..., "destination": ...}`
/// and also accepts the `folderPath` / `filePath` / `sourcePath` /
/// `destinationPath` parameter names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum FileOperation {
    /// List a directory or an archive prefix.
    List {
        #[serde(alias = "folderPath")]
        path: String,
    },
    /// Read a file or archive entry.
    Read {
        #[serde(alias = "filePath")]
        path: String,
    },
    /// Copy between any combination of disk and archive paths.
    Copy {
        #[serde(alias = "sourcePath")]
        source: String,
        #[serde(alias = "destinationPath")]
        destination: String,
    },
    /// Move on disk.
    Move {
        #[serde(alias = "sourcePath")]
        source: String,
        #[serde(alias = "destinationPath")]
        destination: String,
    },
    /// List filesystem roots.
    Drives,
}

impl FileOperation {
    pub fn list(path: impl Into<String>) -> Self {
        Self::List { path: path.into() }
    }

    pub fn read(path: impl Into<String>) -> Self {
        Self::Read { path: path.into() }
    }

    pub fn copy(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::Copy {
            source: source.into(),
            destination: destination.into(),
        }
    }

    pub fn move_to(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::Move {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Operation name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::Read { .. } => "read",
            Self::Copy { .. } => "copy",
            Self::Move { .. } => "move",
            Self::Drives => "drives",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_aliases() {
        let op: FileOperation = serde_json::from_str(
            r#"{"operation": "copy", "sourcePath": "/a.txt", "destinationPath": "/b.zip/a.txt"}"#,
        )
        .unwrap();
        assert_eq!(op, FileOperation::copy("/a.txt", "/b.zip/a.txt"));

        let op: FileOperation =
            serde_json::from_str(r#"{"operation": "list", "folderPath": "/tmp"}"#).unwrap();
        assert_eq!(op, FileOperation::list("/tmp"));

        let op: FileOperation = serde_json::from_str(r#"{"operation": "drives"}"#).unwrap();
        assert_eq!(op.name(), "drives");
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let result: Result<FileOperation, _> =
            serde_json::from_str(r#"{"operation": "explode", "path": "/"}"#);
        assert!(result.is_err());
    }
}
