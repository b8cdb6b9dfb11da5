use core::fmt;
use std::collections::{HashMap, VecDeque};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::{Bytes, BytesMut};
use fs2::FileExt;
use burrowdb_error::{errdata, errinput, Error};

use crate::page::{Page, PAGE_SIZE};
use crate::typedef::PageId;
use crate::Result;

const EMPTY_BUFFER: &[u8] = &[0; PAGE_SIZE];

/// A page-oriented database file.
///
/// Pages are allocated with monotonically increasing page numbers (the first
/// page is 1; 0 is the invalid sentinel) and stored at file offsets tracked
/// by an in-memory directory. Offsets of deleted pages are recycled for
/// future allocations. The file is locked exclusively for the lifetime of
/// the `DbFile`.
///
/// All operations take `&self`; an interior mutex makes the file safe to
/// share between the buffer pool and concurrent callers.
pub struct DbFile {
    path: PathBuf,
    inner: Mutex<FileInner>,
}

struct FileInner {
    file: std::fs::File,
    /// The maximum capacity (in pages) that the file can hold before we resize it.
    page_capacity: usize,
    /// Tracks the highest page number allocated so far.
    last_allocated_pid: PageId,
    /// Map from page number -> file offset.
    pages: HashMap<PageId, u64>,
    /// Free file offsets to reuse for future page allocations.
    free_slots: VecDeque<u64>,
}

impl fmt::Debug for DbFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbFile").field("path", &self.path).finish()
    }
}

impl DbFile {
    /// Creates the database file at `path`, truncating any existing content,
    /// and acquires an exclusive lock on it.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = std::fs::OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::IO(format!("Unable to open file {}: {}", path.display(), e)))?;

        file.lock_exclusive()
            .map_err(|e| Error::IO(format!("Failed to acquire exclusive file lock: {}", e)))?;

        let mut inner = FileInner {
            file,
            page_capacity: 32, // Start with 32 as the default capacity
            last_allocated_pid: 0,
            pages: HashMap::new(),
            free_slots: VecDeque::new(),
        };
        inner.resize_file()?;

        Ok(Self {
            path,
            inner: Mutex::new(inner),
        })
    }

    /// Reads an allocated page from disk.
    pub fn read_page(&self, page_no: PageId) -> Result<Page> {
        let mut inner = self.inner.lock()?;
        let offset = match inner.pages.get(&page_no) {
            Some(&off) => off,
            None => {
                return errinput!("page {} is not allocated in {}", page_no, self.path.display())
            }
        };

        inner.file.seek(SeekFrom::Start(offset))?;
        let mut bytes = BytesMut::zeroed(PAGE_SIZE);
        inner.file.read_exact(&mut bytes)?;
        Ok(Page::new(page_no, bytes.freeze()))
    }

    /// Writes a page back to disk at its embedded page number.
    pub fn write_page(&self, page: &Page) -> Result<()> {
        if page.data().len() != PAGE_SIZE {
            return errdata!("Page data must be exactly one page long.");
        }

        let mut inner = self.inner.lock()?;
        let offset = match inner.pages.get(&page.page_number()) {
            Some(&off) => off,
            None => {
                return errinput!(
                    "page {} is not allocated in {}",
                    page.page_number(),
                    self.path.display()
                )
            }
        };

        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(page.data())?;
        inner.file.sync_all()?;
        Ok(())
    }

    /// Allocates a fresh, zeroed page with a new unique page number.
    pub fn allocate_page(&self) -> Result<Page> {
        let mut inner = self.inner.lock()?;
        inner.last_allocated_pid += 1;
        let pid = inner.last_allocated_pid;

        // Find or create an offset for the page, then zero it on disk.
        let offset = inner.allocate_offset()?;
        inner.pages.insert(pid, offset);
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(EMPTY_BUFFER)?;
        inner.file.sync_all()?;

        Ok(Page::new(pid, Bytes::from_static(EMPTY_BUFFER)))
    }

    /// Deallocates a page and recycles its offset. Subsequent reads of the
    /// page number fail.
    pub fn delete_page(&self, page_no: PageId) -> Result<()> {
        let mut inner = self.inner.lock()?;
        match inner.pages.remove(&page_no) {
            Some(offset) => {
                inner.free_slots.push_back(offset);
                Ok(())
            }
            None => errinput!("page {} is not allocated in {}", page_no, self.path.display()),
        }
    }

    /// The file's path, for diagnostics.
    pub fn filename(&self) -> String {
        self.path.display().to_string()
    }
}

impl FileInner {
    /// For new pages, either reuse a free offset from `free_slots` or append at the end.
    fn allocate_offset(&mut self) -> Result<u64> {
        if let Some(off) = self.free_slots.pop_front() {
            return Ok(off);
        }

        let used_pages = self.pages.len() as u64;
        if used_pages + 1 >= self.page_capacity as u64 {
            // Double the capacity before appending.
            self.page_capacity *= 2;
            self.resize_file()?;
        }

        Ok(used_pages * PAGE_SIZE as u64)
    }

    /// Resizes the underlying file to `(page_capacity + 1) * PAGE_SIZE` bytes.
    fn resize_file(&mut self) -> Result<()> {
        let size = (self.page_capacity as u64 + 1) * PAGE_SIZE as u64;
        self.file
            .set_len(size)
            .map_err(|e| Error::IO(format!("Failed to resize file: {}", e)))?;
        Ok(())
    }
}

impl Drop for FileInner {
    /// Releases the exclusive lock so another process (or a new `DbFile`)
    /// can take over the file.
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("failed to unlock database file: {e}");
        }
    }
}
