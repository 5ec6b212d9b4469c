//! Disk move with a copy-then-delete fallback across devices.

use std::path::Path;

use tracing::{debug, warn};

use boxfile_core::{EntryType, OpError, is_cross_device};

use crate::fs_ops::FileSystemAccessor;

/// How a move was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
    /// A single native rename.
    Renamed,
    /// Copied to the destination, then the source was deleted.
    CopiedAndDeleted,
}

/// Result of a successful move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveReport {
    pub entry_type: EntryType,
    /// Size of a moved file; directories report none.
    pub size: Option<u64>,
    pub method: MoveMethod,
}

impl FileSystemAccessor {
    /// Move a file or directory, creating the destination's parent.
    ///
    /// A rename that fails because it crosses devices falls back to copying
    /// then deleting the source. The fallback is not transactional: if the
    /// copy skips anything the partial destination stays, the source is kept
    /// and [`OpError::PartialTransfer`] is returned.
    pub async fn move_entry(&self, from: &Path, to: &Path) -> Result<MoveReport, OpError> {
        let source = self.stat(from).await?;
        if source.is_directory && to.starts_with(from) {
            return Err(OpError::invalid(format!(
                "cannot move {} into itself",
                from.display()
            )));
        }

        self.create_parent(to).await?;

        let entry_type = source.entry_type();
        let size = (!source.is_directory).then_some(source.size);

        match self.fs.rename(from, to).await {
            Ok(()) => {
                debug!(from = %from.display(), to = %to.display(), "renamed");
                return Ok(MoveReport {
                    entry_type,
                    size,
                    method: MoveMethod::Renamed,
                });
            }
            Err(e) if is_cross_device(&e) => {
                debug!(from = %from.display(), to = %to.display(), "rename crosses devices, copying instead");
            }
            Err(e) => return Err(OpError::io(from, e)),
        }

        if source.is_directory {
            let copied = self.copy_dir(from, to).await?;
            if !copied.is_complete() {
                return Err(OpError::PartialTransfer {
                    destination: to.to_path_buf(),
                    skipped: copied.skipped,
                });
            }
            let removed = self.remove_dir_all(from).await?;
            if !removed.is_complete() {
                warn!(
                    path = %from.display(),
                    skipped = removed.skipped,
                    "source directory only partially removed after move"
                );
            }
        } else {
            self.copy_file(from, to).await?;
            self.remove_file(from).await?;
        }

        Ok(MoveReport {
            entry_type,
            size,
            method: MoveMethod::CopiedAndDeleted,
        })
    }
}
