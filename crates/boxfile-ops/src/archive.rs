//! ZIP container access: list, read, extract, add and delete entries.
//!
//! Mutations rewrite the container into a temporary file next to it, copying
//! untouched entries without recompressing them, then persist the temporary
//! file over the original. Concurrent writers to the same container are not
//! serialized.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use compact_str::CompactString;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use boxfile_core::{ArchiveEntry, EntryType, OpError};

type Reader = ZipArchive<BufReader<File>>;

/// Upper bound on the buffer reserved up front when reading an entry.
const READ_CAPACITY_CAP: u64 = 1 << 20;

/// An open container plus its entry names with `\` turned into `/` and
/// leading slashes stripped, indexed like the archive itself. Every lookup
/// goes through these names so entries written on Windows resolve too.
struct OpenArchive {
    zip: Reader,
    names: Vec<String>,
}

impl OpenArchive {
    fn new(mut zip: Reader, container: &Path) -> Result<Self, OpError> {
        let names = (0..zip.len())
            .map(|i| {
                zip.by_index_raw(i)
                    .map(|file| normalize_entry_name(file.name()))
                    .map_err(|e| zip_error(container, e))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { zip, names })
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn has_dir_prefix(&self, internal: &str) -> bool {
        let prefix = format!("{internal}/");
        self.names.iter().any(|n| n.starts_with(&prefix))
    }
}

/// Content read from an archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveContent {
    /// Lossily decoded UTF-8.
    Text(String),
    Binary(Vec<u8>),
}

impl ArchiveContent {
    /// Size of the content in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(s) => s.into_bytes(),
            Self::Binary(b) => b,
        }
    }
}

/// Operations against ZIP containers on disk.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveAccessor {
    compression: CompressionMethod,
}

impl Default for ArchiveAccessor {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
        }
    }
}

impl ArchiveAccessor {
    /// Create an accessor that deflates new entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression method used for entries added to archives.
    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }

    /// True iff the path exists and has a `.zip` extension (case-insensitive).
    pub fn exists(container: &Path) -> bool {
        has_zip_extension(container) && container.exists()
    }

    /// List the direct children of `prefix` inside the archive.
    ///
    /// Directories that only exist implicitly (through deeper entry names)
    /// are reported as directory entries.
    pub fn list(&self, container: &Path, prefix: &str) -> Result<Vec<ArchiveEntry>, OpError> {
        let mut archive = self.open(container)?;
        let trimmed = prefix.trim_matches('/');
        let dir_prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}/")
        };

        let mut children: BTreeMap<String, ArchiveEntry> = BTreeMap::new();
        let mut prefix_found = dir_prefix.is_empty();

        for i in 0..archive.names.len() {
            let Some(rest) = archive.names[i].strip_prefix(&dir_prefix) else {
                continue;
            };
            prefix_found = true;
            if rest.is_empty() {
                continue;
            }
            let file = archive
                .zip
                .by_index_raw(i)
                .map_err(|e| zip_error(container, e))?;

            match rest.split_once('/') {
                Some((dir, tail)) => {
                    let entry = children.entry(dir.to_string()).or_insert_with(|| ArchiveEntry {
                        name: CompactString::new(dir),
                        internal_path: format!("{dir_prefix}{dir}"),
                        size: 0,
                        is_directory: true,
                        modified: None,
                    });
                    // Explicit directory records carry their own timestamp.
                    if tail.is_empty() {
                        entry.modified = modified_of(file.last_modified());
                    }
                }
                None => {
                    children.insert(
                        rest.to_string(),
                        ArchiveEntry {
                            name: CompactString::new(rest),
                            internal_path: archive.names[i].clone(),
                            size: file.size(),
                            is_directory: false,
                            modified: modified_of(file.last_modified()),
                        },
                    );
                }
            }
        }

        if !prefix_found {
            return Err(OpError::EntryNotFound {
                container: container.to_path_buf(),
                entry: trimmed.to_string(),
            });
        }

        Ok(children.into_values().collect())
    }

    /// Describe a single entry (file or directory prefix).
    pub fn entry(&self, container: &Path, internal: &str) -> Result<ArchiveEntry, OpError> {
        let mut archive = self.open(container)?;
        let internal = internal.trim_matches('/');
        let name = CompactString::new(internal.rsplit('/').next().unwrap_or(internal));

        if let Some(index) = archive.index_of(internal) {
            let file = archive
                .zip
                .by_index_raw(index)
                .map_err(|e| zip_error(container, e))?;
            return Ok(ArchiveEntry {
                name,
                internal_path: internal.to_string(),
                size: file.size(),
                is_directory: file.is_dir(),
                modified: modified_of(file.last_modified()),
            });
        }

        if archive.has_dir_prefix(internal) {
            return Ok(ArchiveEntry {
                name,
                internal_path: internal.to_string(),
                size: 0,
                is_directory: true,
                modified: None,
            });
        }

        Err(OpError::EntryNotFound {
            container: container.to_path_buf(),
            entry: internal.to_string(),
        })
    }

    /// Read an entry as text or raw bytes.
    pub fn read(
        &self,
        container: &Path,
        internal: &str,
        binary: bool,
    ) -> Result<ArchiveContent, OpError> {
        let mut archive = self.open(container)?;
        let internal = internal.trim_start_matches('/');

        let Some(index) = archive.index_of(internal) else {
            return Err(missing_file(&archive, container, internal));
        };
        let mut file = archive
            .zip
            .by_index(index)
            .map_err(|e| zip_error(container, e))?;
        if file.is_dir() {
            return Err(OpError::type_mismatch(
                container.join(internal),
                EntryType::File,
            ));
        }

        // The header size is untrusted; let the buffer grow past the cap.
        let mut buf = Vec::with_capacity(file.size().min(READ_CAPACITY_CAP) as usize);
        file.read_to_end(&mut buf)
            .map_err(|e| OpError::io(container, e))?;

        debug!(container = %container.display(), entry = internal, bytes = buf.len(), "read archive entry");

        Ok(if binary {
            ArchiveContent::Binary(buf)
        } else {
            ArchiveContent::Text(String::from_utf8_lossy(&buf).into_owned())
        })
    }

    /// Write an entry to `destination`, creating parent directories.
    ///
    /// A directory prefix extracts every entry beneath it into `destination`.
    /// Returns the number of bytes written.
    pub fn extract(
        &self,
        container: &Path,
        internal: &str,
        destination: &Path,
    ) -> Result<u64, OpError> {
        let mut archive = self.open(container)?;
        let internal = internal.trim_matches('/');

        if let Some(index) = archive.index_of(internal) {
            let mut file = archive
                .zip
                .by_index(index)
                .map_err(|e| zip_error(container, e))?;
            if !file.is_dir() {
                return write_entry(&mut file, destination);
            }
        }

        let prefix = format!("{internal}/");
        let matches: Vec<(usize, String)> = archive
            .names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| name.strip_prefix(&prefix).map(|rest| (i, rest.to_string())))
            .collect();

        if matches.is_empty() {
            return Err(OpError::EntryNotFound {
                container: container.to_path_buf(),
                entry: internal.to_string(),
            });
        }

        fs::create_dir_all(destination).map_err(|e| OpError::io(destination, e))?;

        let mut written = 0u64;
        for (index, rest) in matches {
            if rest.is_empty() {
                continue;
            }
            let Some(target) = safe_join(destination, &rest) else {
                warn!(entry = %rest, "skipping archive entry outside the destination");
                continue;
            };
            let mut file = archive
                .zip
                .by_index(index)
                .map_err(|e| zip_error(container, e))?;
            if file.is_dir() {
                fs::create_dir_all(&target).map_err(|e| OpError::io(&target, e))?;
            } else {
                written += write_entry(&mut file, &target)?;
            }
        }

        Ok(written)
    }

    /// Insert or overwrite `internal` with the contents of a real file.
    ///
    /// A missing container is created.
    pub fn add(&self, container: &Path, source: &Path, internal: &str) -> Result<(), OpError> {
        if !has_zip_extension(container) {
            return Err(OpError::ArchiveNotFound {
                path: container.to_path_buf(),
            });
        }
        let internal = internal.trim_matches('/');
        if internal.is_empty() {
            return Err(OpError::invalid("archive entry path is empty"));
        }

        let metadata = fs::metadata(source).map_err(|e| OpError::io(source, e))?;
        if !metadata.is_file() {
            return Err(OpError::type_mismatch(source, EntryType::File));
        }

        let options = SimpleFileOptions::default()
            .compression_method(self.compression)
            .large_file(metadata.len() >= u32::MAX as u64);

        let replaced = self.rewrite(
            container,
            |name| name != internal,
            |writer| {
                writer
                    .start_file(internal, options)
                    .map_err(|e| zip_error(container, e))?;
                let mut src = File::open(source).map_err(|e| OpError::io(source, e))?;
                io::copy(&mut src, writer).map_err(|e| OpError::io(source, e))?;
                Ok(())
            },
        )?;

        debug!(
            container = %container.display(),
            entry = internal,
            replaced,
            "added archive entry"
        );
        Ok(())
    }

    /// Remove an entry, or every entry beneath a directory prefix.
    ///
    /// Returns the number of entries removed.
    pub fn delete(&self, container: &Path, internal: &str) -> Result<usize, OpError> {
        let target = internal.trim_matches('/');
        let prefix = format!("{target}/");
        let matches = |name: &str| name == target || name.starts_with(&prefix);

        let archive = self.open(container)?;
        if target.is_empty() {
            return Err(OpError::invalid("archive entry path is empty"));
        }
        let found = archive.names.iter().any(|name| matches(name));
        drop(archive);

        if !found {
            return Err(OpError::EntryNotFound {
                container: container.to_path_buf(),
                entry: target.to_string(),
            });
        }

        let removed = self.rewrite(container, |name| !matches(name), |_| Ok(()))?;
        debug!(container = %container.display(), entry = target, removed, "deleted archive entries");
        Ok(removed)
    }

    fn open(&self, container: &Path) -> Result<OpenArchive, OpError> {
        if !Self::exists(container) {
            return Err(OpError::ArchiveNotFound {
                path: container.to_path_buf(),
            });
        }
        let file = File::open(container).map_err(|e| OpError::io(container, e))?;
        let zip = ZipArchive::new(BufReader::new(file)).map_err(|e| zip_error(container, e))?;
        OpenArchive::new(zip, container)
    }

    /// Rewrite the container, raw-copying entries whose normalized name
    /// satisfies `keep`, then let `append` write new entries. Returns how many
    /// entries were dropped.
    fn rewrite<K, A>(&self, container: &Path, keep: K, append: A) -> Result<usize, OpError>
    where
        K: Fn(&str) -> bool,
        A: FnOnce(&mut ZipWriter<NamedTempFile>) -> Result<(), OpError>,
    {
        let dir = container
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let temp = NamedTempFile::new_in(dir).map_err(|e| OpError::io(dir, e))?;
        let mut writer = ZipWriter::new(temp);
        let mut dropped = 0;

        if container.exists() {
            let mut archive = self.open(container)?;
            for i in 0..archive.names.len() {
                let keep_entry = keep(&archive.names[i]);
                let file = archive
                    .zip
                    .by_index_raw(i)
                    .map_err(|e| zip_error(container, e))?;
                if keep_entry {
                    writer.raw_copy_file(file).map_err(|e| zip_error(container, e))?;
                } else {
                    dropped += 1;
                }
            }
        }

        append(&mut writer)?;

        let temp = writer.finish().map_err(|e| zip_error(container, e))?;
        temp.persist(container)
            .map_err(|e| OpError::io(container, e.error))?;

        Ok(dropped)
    }
}

fn has_zip_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

fn normalize_entry_name(name: &str) -> String {
    name.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Error for a file lookup that found nothing: a directory prefix is a type
/// mismatch, anything else is missing.
fn missing_file(archive: &OpenArchive, container: &Path, internal: &str) -> OpError {
    if archive.has_dir_prefix(internal) {
        OpError::type_mismatch(container.join(internal), EntryType::File)
    } else {
        OpError::EntryNotFound {
            container: container.to_path_buf(),
            entry: internal.to_string(),
        }
    }
}

fn write_entry<R: Read>(entry: &mut R, destination: &Path) -> Result<u64, OpError> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| OpError::io(parent, e))?;
    }
    let mut out = File::create(destination).map_err(|e| OpError::io(destination, e))?;
    io::copy(entry, &mut out).map_err(|e| OpError::io(destination, e))
}

/// Join an archive-relative name onto `root`, rejecting names that would
/// escape it.
fn safe_join(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| root.join(relative))
}

fn modified_of(time: Option<zip::DateTime>) -> Option<NaiveDateTime> {
    let time = time?;
    NaiveDate::from_ymd_opt(time.year() as i32, time.month() as u32, time.day() as u32)?
        .and_hms_opt(time.hour() as u32, time.minute() as u32, time.second() as u32)
}

fn zip_error(path: &Path, error: ZipError) -> OpError {
    match error {
        ZipError::Io(source) => OpError::io(path, source),
        other => OpError::Archive {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    }
}
