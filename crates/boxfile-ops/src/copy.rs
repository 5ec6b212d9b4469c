//! Disk copy primitives.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use boxfile_core::OpError;

use crate::fs_ops::{FileSystemAccessor, TransferReport};

impl FileSystemAccessor {
    /// Copy one file, creating the destination's parent directory first.
    ///
    /// Returns the number of bytes copied.
    pub async fn copy_file(&self, from: &Path, to: &Path) -> Result<u64, OpError> {
        self.create_parent(to).await?;
        let bytes = self
            .fs
            .copy_file(from, to)
            .await
            .map_err(|e| OpError::io(from, e))?;
        debug!(from = %from.display(), to = %to.display(), bytes, "copied file");
        Ok(bytes)
    }

    /// Recursively copy a directory.
    ///
    /// Per-entry failures are logged and counted in `skipped`; only failing to
    /// create `to` or to list `from` aborts the call. `to` may not lie inside
    /// `from`.
    pub async fn copy_dir(&self, from: &Path, to: &Path) -> Result<TransferReport, OpError> {
        if to.starts_with(from) {
            return Err(OpError::invalid(format!(
                "cannot copy {} into itself",
                from.display()
            )));
        }
        self.mkdir(to).await?;

        let mut report = TransferReport::default();
        let mut pending: Vec<(PathBuf, PathBuf)> = vec![(from.to_path_buf(), to.to_path_buf())];

        while let Some((src, dst)) = pending.pop() {
            let is_root = src.as_path() == from;
            if !is_root {
                if let Err(e) = self.fs.create_dir_all(&dst).await {
                    warn!(path = %dst.display(), error = %e, "unable to create directory, skipping");
                    report.skipped += 1;
                    continue;
                }
            }

            let entries = match self.fs.read_dir(&src).await {
                Ok(entries) => entries,
                Err(e) if is_root => return Err(OpError::io(from, e)),
                Err(e) => {
                    warn!(path = %src.display(), error = %e, "unable to read directory, skipping");
                    report.skipped += 1;
                    continue;
                }
            };

            for entry in entries {
                let target = dst.join(entry.name.as_str());
                if entry.is_dir() {
                    pending.push((entry.path, target));
                    continue;
                }
                match self.fs.copy_file(&entry.path, &target).await {
                    Ok(bytes) => {
                        report.files += 1;
                        report.bytes += bytes;
                    }
                    Err(e) => {
                        warn!(path = %entry.path.display(), error = %e, "unable to copy file, skipping");
                        report.skipped += 1;
                    }
                }
            }
        }

        debug!(
            from = %from.display(),
            to = %to.display(),
            files = report.files,
            bytes = report.bytes,
            skipped = report.skipped,
            "copied directory"
        );
        Ok(report)
    }
}
