use core::fmt;
use std::sync::{
    atomic::{AtomicU16, Ordering},
    Arc, RwLock,
};

use bytes::Bytes;

use crate::{
    disk::db_file::DbFile,
    page::{Page, INVALID_PAGE_ID, PAGE_SIZE},
    typedef::{FileId, PageId},
};

/// A buffer pool frame: the cached copy of one disk page together with the
/// bookkeeping the pool needs to manage it.
///
/// An empty frame holds no file reference at all, so a scan over the frame
/// table can never mistake a cleared frame for a resident page of some file.
pub struct PageFrame {
    file: Option<Arc<DbFile>>, // Owning file of the cached page, when valid
    page_no: PageId,
    valid: bool,
    dirty: bool,        // Modified since last write-back
    refbit: bool,       // CLOCK reference bit; set on a hit, cleared by the hand
    pin_cnt: AtomicU16, // Number of active borrows of the frame
    lock: RwLock<()>,   // Latch over the frame data, held by handles
    data: [u8; PAGE_SIZE],
}

impl fmt::Debug for PageFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFrame")
            .field("page_no", &self.page_no)
            .field("valid", &self.valid)
            .field("dirty", &self.dirty)
            .field("refbit", &self.refbit)
            .field("pin_cnt", &self.pin_cnt.load(Ordering::SeqCst))
            .finish()
    }
}

impl PageFrame {
    /// Creates a new, empty frame.
    pub(crate) fn new() -> Self {
        Self {
            file: None,
            page_no: INVALID_PAGE_ID,
            valid: false,
            dirty: false,
            refbit: false,
            pin_cnt: AtomicU16::new(0),
            lock: RwLock::new(()),
            data: [0; PAGE_SIZE],
        }
    }

    /// Installs a newly admitted page: identity set, one pin held by the
    /// admitting caller, dirty and reference bits cleared.
    pub(crate) fn set(&mut self, file: Arc<DbFile>, page_no: PageId) {
        self.file = Some(file);
        self.page_no = page_no;
        self.valid = true;
        self.dirty = false;
        self.refbit = false;
        self.pin_cnt.store(1, Ordering::Release);
    }

    /// Returns the frame to the empty state. Idempotent.
    pub(crate) fn reset(&mut self) {
        self.file = None;
        self.page_no = INVALID_PAGE_ID;
        self.valid = false;
        self.dirty = false;
        self.refbit = false;
        self.pin_cnt.store(0, Ordering::Release);
        self.data.fill(0);
    }

    /// Whether the frame currently caches a page.
    pub(crate) fn is_valid(&self) -> bool {
        self.valid
    }

    /// The file owning the cached page, when the frame is valid.
    pub(crate) fn file(&self) -> Option<&Arc<DbFile>> {
        self.file.as_ref()
    }

    pub(crate) fn file_id(&self) -> Option<FileId> {
        self.file.as_ref().map(FileId::of)
    }

    /// The number of the cached page. Meaningless while the frame is empty.
    pub fn page_no(&self) -> PageId {
        self.page_no
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub(crate) fn refbit(&self) -> bool {
        self.refbit
    }

    pub(crate) fn set_refbit(&mut self, refbit: bool) {
        self.refbit = refbit;
    }

    /// Returns the current pin count.
    pub(crate) fn pin_count(&self) -> u16 {
        self.pin_cnt.load(Ordering::Acquire)
    }

    /// Increments the pin count by 1.
    pub(crate) fn increment_pin_count(&mut self) {
        self.pin_cnt.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrements the pin count by 1, ensuring it never goes below zero.
    pub(crate) fn decrement_pin_count(&mut self) {
        let old = self.pin_cnt.fetch_sub(1, Ordering::SeqCst);
        if old == 0 {
            panic!(
                "Pin count should not be zero when decrementing. Page: {}",
                self.page_no
            );
        }
    }

    /// Provides read-only access to the frame data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Writes data into the frame at the given offset.
    pub fn write(&mut self, offset: usize, data: &[u8]) {
        if offset + data.len() > PAGE_SIZE {
            panic!("Write out of bounds");
        }
        self.data[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Copies an on-disk page into the frame.
    pub(crate) fn copy_from_page(&mut self, page: &Page) {
        self.data.copy_from_slice(page.data());
    }

    /// Snapshots the frame as a page value suitable for write-back.
    pub(crate) fn to_page(&self) -> Page {
        Page::new(self.page_no, Bytes::copy_from_slice(&self.data))
    }

    /// Acquires a read latch on the frame data.
    pub(crate) fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap()
    }

    /// Acquires a write latch on the frame data.
    pub(crate) fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, ()> {
        self.lock.write().unwrap()
    }
}
