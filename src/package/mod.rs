//! Virtual file table: the archive as an ordered, path-addressable store.

mod archive;
mod entry;

pub use archive::{PackageArchive, normalize_path};
pub use entry::{Entry, StoredMeta};
