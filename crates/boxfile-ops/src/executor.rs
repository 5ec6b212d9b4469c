//! Operation executor: resolves virtual paths and routes each request to the
//! archive or disk accessor.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use futures::FutureExt;
use tracing::{debug, warn};
use zip::CompressionMethod;

use boxfile_core::{EntryType, Filesystem, OpError, VirtualPath, is_archive_name};

use crate::archive::ArchiveAccessor;
use crate::fs_ops::FileSystemAccessor;
use crate::mime;
use crate::operation::FileOperation;
use crate::result::{
    Drive, DriveList, FileContent, ListedEntry, Listing, OperationFailure, OperationResult,
    Outcome, Transfer,
};

/// Prefix of the staging directories used for archive-to-archive copies.
const STAGING_PREFIX: &str = "boxfile-";

/// Executes [`FileOperation`]s against disk paths and ZIP archives.
///
/// Every call returns an [`OperationResult`]; errors and panics are turned
/// into failures instead of escaping.
#[derive(Debug, Clone, Default)]
pub struct OperationExecutor {
    fs: FileSystemAccessor,
    archive: ArchiveAccessor,
    /// Where archive-to-archive copies are staged; the system temp dir if unset.
    temp_dir: Option<PathBuf>,
}

impl OperationExecutor {
    /// Create an executor over the real filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different filesystem backend for disk operations.
    pub fn with_filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.fs = FileSystemAccessor::new(fs);
        self
    }

    /// Stage archive-to-archive copies under `dir`.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Set the compression method for entries written into archives.
    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.archive = self.archive.with_compression(compression);
        self
    }

    pub fn filesystem(&self) -> &FileSystemAccessor {
        &self.fs
    }

    pub fn archive(&self) -> &ArchiveAccessor {
        &self.archive
    }

    /// Execute one operation.
    pub async fn execute(&self, operation: FileOperation) -> OperationResult {
        let name = operation.name();
        debug!(?operation, "executing");

        let result = AssertUnwindSafe(self.dispatch(operation))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(OpError::Unknown {
                    message: panic_message(panic.as_ref()),
                })
            });

        match result {
            Ok(outcome) => OperationResult::Success(outcome),
            Err(error) => {
                warn!(operation = name, %error, "operation failed");
                OperationResult::Failure(OperationFailure::from_error(name, &error))
            }
        }
    }

    async fn dispatch(&self, operation: FileOperation) -> Result<Outcome, OpError> {
        match operation {
            FileOperation::List { path } => self.list(&path).await.map(Outcome::List),
            FileOperation::Read { path } => self.read(&path).await.map(Outcome::Read),
            FileOperation::Copy {
                source,
                destination,
            } => self.copy(&source, &destination).await.map(Outcome::Copy),
            FileOperation::Move {
                source,
                destination,
            } => self.move_to(&source, &destination).await.map(Outcome::Move),
            FileOperation::Drives => Ok(Outcome::Drives(list_drives())),
        }
    }

    /// List a disk directory or an archive prefix. A bare `.zip` path lists
    /// the archive root.
    pub async fn list(&self, raw: &str) -> Result<Listing, OpError> {
        let vp = resolve(raw, "path")?;
        let display = vp.to_string();

        let (container, prefix) = match vp {
            VirtualPath::Archive {
                container,
                internal,
            } => (container, internal),
            VirtualPath::Disk { path } if names_archive(&path) => (path, String::new()),
            VirtualPath::Disk { path } => {
                let path = absolute(&path)?;
                let listing = self.fs.list(&path).await?;
                return Ok(Listing::new(
                    path.display().to_string(),
                    listing.total_items,
                    listing.directories.into_iter().map(ListedEntry::Disk).collect(),
                    listing.files.into_iter().map(ListedEntry::Disk).collect(),
                ));
            }
        };

        let archive = self.archive;
        let entries = blocking(move || archive.list(&container, &prefix)).await?;
        let total = entries.len();
        let (directories, files): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .map(ListedEntry::Archive)
            .partition(ListedEntry::is_directory);

        Ok(Listing::new(display, total, directories, files))
    }

    /// Read a file or archive entry. Images come back as base64 data URLs.
    pub async fn read(&self, raw: &str) -> Result<FileContent, OpError> {
        let vp = resolve(raw, "path")?;
        let display = vp.to_string();

        match vp {
            VirtualPath::Archive {
                container,
                internal,
            } => {
                let is_image = mime::is_image(&internal);
                let archive = self.archive;
                let name = internal.clone();
                let (modified, bytes) = blocking(move || {
                    let bytes = archive.read(&container, &internal, true)?.into_bytes();
                    let entry = archive.entry(&container, &internal)?;
                    Ok((entry.modified, bytes))
                })
                .await?;

                // Size is the raw entry length, not the decoded text length.
                let size = bytes.len() as u64;
                let content = if is_image {
                    data_url(&name, &bytes)
                } else {
                    String::from_utf8_lossy(&bytes).into_owned()
                };
                Ok(FileContent {
                    path: display,
                    content,
                    size,
                    modified: modified.and_then(local_to_utc).unwrap_or_else(Utc::now),
                    is_image,
                })
            }
            VirtualPath::Disk { path } => {
                let path = absolute(&path)?;
                let stat = self.fs.stat(&path).await?;
                let bytes = self.fs.read(&path).await?;
                let name = path.to_string_lossy();
                let is_image = mime::is_image(&name);
                let content = if is_image {
                    data_url(&name, &bytes)
                } else {
                    String::from_utf8_lossy(&bytes).into_owned()
                };
                Ok(FileContent {
                    path: path.display().to_string(),
                    content,
                    size: stat.size,
                    modified: stat.modified.unwrap_or_else(Utc::now),
                    is_image,
                })
            }
        }
    }

    /// Copy between any combination of disk and archive paths.
    pub async fn copy(&self, source: &str, destination: &str) -> Result<Transfer, OpError> {
        let source = resolve(source, "source")?;
        let destination = resolve(destination, "destination")?;

        match (source, destination) {
            (
                VirtualPath::Archive {
                    container,
                    internal,
                },
                VirtualPath::Disk { path },
            ) => self.extract_to_disk(container, internal, &path).await,
            (
                VirtualPath::Disk { path },
                VirtualPath::Archive {
                    container,
                    internal,
                },
            ) => self.add_from_disk(&path, container, internal).await,
            (
                VirtualPath::Archive {
                    container: from_container,
                    internal: from_internal,
                },
                VirtualPath::Archive {
                    container: to_container,
                    internal: to_internal,
                },
            ) => {
                self.copy_between_archives(from_container, from_internal, to_container, to_internal)
                    .await
            }
            (VirtualPath::Disk { path: from }, VirtualPath::Disk { path: to }) => {
                self.copy_on_disk(&from, &to).await
            }
        }
    }

    /// Move on disk. Archive endpoints are rejected.
    pub async fn move_to(&self, source: &str, destination: &str) -> Result<Transfer, OpError> {
        let (from, to) = match (
            resolve(source, "source")?,
            resolve(destination, "destination")?,
        ) {
            (VirtualPath::Disk { path: from }, VirtualPath::Disk { path: to }) => (from, to),
            _ => {
                return Err(OpError::invalid(
                    "move is only supported between disk paths; use copy for archives",
                ));
            }
        };

        let from = absolute(&from)?;
        let to = absolute(&to)?;
        let report = self.fs.move_entry(&from, &to).await?;
        debug!(from = %from.display(), to = %to.display(), method = ?report.method, "moved");

        Ok(Transfer::new(
            from.display().to_string(),
            to.display().to_string(),
            report.entry_type,
            report.size,
        ))
    }

    async fn extract_to_disk(
        &self,
        container: PathBuf,
        internal: String,
        destination: &Path,
    ) -> Result<Transfer, OpError> {
        let source = VirtualPath::Archive {
            container: container.clone(),
            internal: internal.clone(),
        }
        .to_string();
        let destination = absolute(destination)?;

        let archive = self.archive;
        let target = destination.clone();
        blocking(move || archive.extract(&container, &internal, &target)).await?;

        let stat = self.fs.stat(&destination).await?;
        let size = (!stat.is_directory).then_some(stat.size);
        Ok(Transfer::new(
            source,
            destination.display().to_string(),
            stat.entry_type(),
            size,
        ))
    }

    async fn add_from_disk(
        &self,
        source: &Path,
        container: PathBuf,
        internal: String,
    ) -> Result<Transfer, OpError> {
        let source = absolute(source)?;
        let stat = self.fs.stat(&source).await?;
        if stat.is_directory {
            return Err(OpError::type_mismatch(&source, EntryType::File));
        }

        let destination = VirtualPath::Archive {
            container: container.clone(),
            internal: internal.clone(),
        }
        .to_string();

        let archive = self.archive;
        let from = source.clone();
        blocking(move || archive.add(&container, &from, &internal)).await?;

        Ok(Transfer::new(
            source.display().to_string(),
            destination,
            EntryType::File,
            Some(stat.size),
        ))
    }

    /// Extract into a staging file, add it to the destination archive, then
    /// remove the staging directory whether or not the add succeeded.
    async fn copy_between_archives(
        &self,
        from_container: PathBuf,
        from_internal: String,
        to_container: PathBuf,
        to_internal: String,
    ) -> Result<Transfer, OpError> {
        let source = VirtualPath::Archive {
            container: from_container.clone(),
            internal: from_internal.clone(),
        };
        let destination = VirtualPath::Archive {
            container: to_container.clone(),
            internal: to_internal.clone(),
        }
        .to_string();

        let staging_root = self.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&staging_root)
            .map_err(|e| OpError::io(&staging_root, e))?;
        let base = from_internal.rsplit('/').next().unwrap_or("entry");
        let staged = staging
            .path()
            .join(format!("{}_{base}", Utc::now().timestamp_millis()));

        let archive = self.archive;
        let source_display = source.to_string();
        let result = blocking(move || {
            let entry = archive.entry(&from_container, &from_internal)?;
            if entry.is_directory {
                return Err(OpError::type_mismatch(source_display, EntryType::File));
            }
            let bytes = archive.extract(&from_container, &from_internal, &staged)?;
            archive.add(&to_container, &staged, &to_internal)?;
            Ok(bytes)
        })
        .await;

        let staging_path = staging.path().to_path_buf();
        if let Err(e) = staging.close() {
            warn!(path = %staging_path.display(), error = %e, "failed to remove staging directory");
        }

        let bytes = result?;
        Ok(Transfer::new(
            source.to_string(),
            destination,
            EntryType::File,
            Some(bytes),
        ))
    }

    async fn copy_on_disk(&self, from: &Path, to: &Path) -> Result<Transfer, OpError> {
        let from = absolute(from)?;
        let to = absolute(to)?;
        let stat = self.fs.stat(&from).await?;

        if stat.is_directory {
            let report = self.fs.copy_dir(&from, &to).await?;
            let mut transfer = Transfer::new(
                from.display().to_string(),
                to.display().to_string(),
                EntryType::Directory,
                None,
            );
            transfer.skipped = report.skipped;
            return Ok(transfer);
        }

        self.fs.copy_file(&from, &to).await?;
        let copied = self.fs.stat(&to).await?;
        Ok(Transfer::new(
            from.display().to_string(),
            to.display().to_string(),
            EntryType::File,
            Some(copied.size),
        ))
    }
}

/// Filesystem roots: existing drive letters on Windows, `/` elsewhere.
pub fn list_drives() -> DriveList {
    let drives = if cfg!(windows) {
        ('A'..='Z')
            .filter_map(|letter| {
                let path = format!("{letter}:\\");
                Path::new(&path).exists().then(|| Drive {
                    letter: letter.to_string(),
                    label: format!("{letter}:"),
                    path,
                })
            })
            .collect()
    } else {
        vec![Drive {
            letter: "/".to_string(),
            path: "/".to_string(),
            label: "/".to_string(),
        }]
    };
    DriveList { drives }
}

fn resolve(raw: &str, parameter: &str) -> Result<VirtualPath, OpError> {
    if raw.trim().is_empty() {
        return Err(OpError::invalid(format!("{parameter} is required")));
    }
    Ok(VirtualPath::parse(raw))
}

fn names_archive(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| is_archive_name(&name.to_string_lossy()))
}

fn absolute(path: &Path) -> Result<PathBuf, OpError> {
    std::path::absolute(path).map_err(|e| OpError::io(path, e))
}

/// Run blocking archive work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T, OpError>
where
    F: FnOnce() -> Result<T, OpError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| OpError::Unknown {
            message: format!("archive task failed: {e}"),
        })?
}

fn data_url(name: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime::image_mime(name), BASE64.encode(bytes))
}

/// ZIP timestamps are local time.
fn local_to_utc(time: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&time)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("operation panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("operation panicked: {s}")
    } else {
        "operation panicked".to_string()
    }
}
