use std::sync::Arc;

use crate::disk::db_file::DbFile;

/// Index of a frame in the buffer pool, in `[0, pool_size)`.
pub type FrameId = usize;

/// Identifier of a page within a database file.
pub type PageId = u32;

/// Identity of an open database file.
///
/// Derived from the address of the file's `Arc` allocation: clones of the
/// same `Arc<DbFile>` agree, while two files opened separately are distinct
/// keys even when they name the same path. Every resident page's frame holds
/// an `Arc` to its file, so an id cannot be reused while pages of that file
/// are still mapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileId(usize);

impl FileId {
    pub(crate) fn of(file: &Arc<DbFile>) -> Self {
        FileId(Arc::as_ptr(file) as usize)
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: usize) -> Self {
        FileId(raw)
    }
}
