//! File and ZIP archive operations engine for boxfile.
//!
//! [`OperationExecutor`] takes a [`FileOperation`] whose paths may point into
//! ZIP archives (`/data/photos.zip/2024/a.jpg`), resolves them and routes the
//! work to [`ArchiveAccessor`] or [`FileSystemAccessor`]. Results are
//! structured values that serialize to the JSON shapes consumed by callers.

mod archive;
mod copy;
mod executor;
mod fs_ops;
mod mime;
mod move_op;
mod operation;
mod result;

pub use archive::{ArchiveAccessor, ArchiveContent};
pub use executor::{OperationExecutor, list_drives};
pub use fs_ops::{DiskListing, FileSystemAccessor, TransferReport};
pub use mime::{image_mime, is_image};
pub use move_op::{MoveMethod, MoveReport};
pub use operation::FileOperation;
pub use result::{
    Drive, DriveList, FileContent, ListSummary, ListedEntry, Listing, OperationFailure,
    OperationResult, Outcome, Transfer,
};

/// Compression methods accepted by [`OperationExecutor::with_compression`].
pub use zip::CompressionMethod;
