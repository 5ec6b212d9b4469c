//! Virtual paths that address either the real filesystem or a ZIP archive.

use std::fmt;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use serde::{Deserialize, Serialize};

/// Extension that marks a path segment as an archive container.
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// A path string resolved into either a disk location or a location inside a
/// ZIP archive.
///
/// Archives are never nested: the leftmost segment ending in `.zip` that is
/// followed by a non-empty segment terminates the container path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VirtualPath {
    /// A plain filesystem path (including a path to an archive file itself).
    Disk { path: PathBuf },
    /// An entry inside a ZIP container.
    Archive {
        /// Host-separator-normalized path to the `.zip` file.
        container: PathBuf,
        /// Forward-slash path inside the archive, without a leading slash.
        internal: String,
    },
}

impl VirtualPath {
    /// Resolve a path string.
    ///
    /// Accepts any mix of `/` and the host separator.
    pub fn parse(raw: &str) -> Self {
        let segments: Vec<&str> = raw.split(is_separator).collect();

        let Some(container_end) = segments.iter().position(|s| is_archive_name(s)) else {
            return Self::Disk { path: PathBuf::from(raw) };
        };

        let internal = segments[container_end + 1..]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/");

        if internal.is_empty() {
            return Self::Disk { path: PathBuf::from(raw) };
        }

        let container = segments[..=container_end].join(&MAIN_SEPARATOR.to_string());

        Self::Archive {
            container: PathBuf::from(container),
            internal,
        }
    }

    /// Whether this path points inside an archive.
    pub fn is_archive_path(&self) -> bool {
        matches!(self, Self::Archive { .. })
    }

    /// The archive file, for archive paths.
    pub fn container_path(&self) -> Option<&Path> {
        match self {
            Self::Archive { container, .. } => Some(container),
            Self::Disk { .. } => None,
        }
    }

    /// The entry path inside the archive, for archive paths.
    pub fn internal_path(&self) -> Option<&str> {
        match self {
            Self::Archive { internal, .. } => Some(internal),
            Self::Disk { .. } => None,
        }
    }

    /// The disk path, for non-archive paths.
    pub fn disk_path(&self) -> Option<&Path> {
        match self {
            Self::Disk { path } => Some(path),
            Self::Archive { .. } => None,
        }
    }

    /// Last component of the path (entry base name for archive paths).
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::Disk { path } => path.file_name().map(|n| n.to_string_lossy().into_owned()),
            Self::Archive { internal, .. } => internal.rsplit('/').next().map(str::to_string),
        }
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disk { path } => write!(f, "{}", path.display()),
            Self::Archive { container, internal } => {
                write!(f, "{}/{}", container.display(), internal)
            }
        }
    }
}

impl From<&str> for VirtualPath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == MAIN_SEPARATOR
}

/// Whether a file name carries the archive extension (case-insensitive).
pub fn is_archive_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(ARCHIVE_EXTENSION)
}
