use core::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::buffer_pool::BufferPoolManager;
use crate::disk::db_file::DbFile;
use crate::frame::PageFrame;
use crate::typedef::PageId;

/// A handle to a pinned, read-only page frame.
///
/// The handle remembers the `(file, page)` identity it pinned so that
/// dropping it releases the pin, making the page evictable again. The frame
/// reference is unusable past that point, which the borrow checker enforces
/// by tying it to the handle's lifetime.
pub struct PageFrameRefHandle<'a> {
    bpm: &'a Arc<RwLock<BufferPoolManager>>,
    file: Arc<DbFile>,
    page_no: PageId,
    page_frame: &'a PageFrame,
    lock_guard: RwLockReadGuard<'a, ()>,
}

impl fmt::Debug for PageFrameRefHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFrameRefHandle")
            .field("page_frame", &self.page_frame)
            .finish()
    }
}

impl<'a> PageFrameRefHandle<'a> {
    pub(crate) fn new(bpm: &'a Arc<RwLock<BufferPoolManager>>, page_frame: &'a PageFrame) -> Self {
        let file = page_frame
            .file()
            .cloned()
            .expect("handle constructed over an empty frame");
        let page_no = page_frame.page_no();

        let fp_ptr = &*page_frame as *const PageFrame;
        // SAFETY:
        // Latching through `page_frame` directly would freeze the reference
        // for the guard's lifetime, and both live inside this struct. The
        // raw pointer confines that self-reference to the handle itself.
        let lock_guard = unsafe { (*fp_ptr).read_lock() };
        PageFrameRefHandle {
            bpm,
            file,
            page_no,
            page_frame,
            lock_guard,
        }
    }
}

impl Drop for PageFrameRefHandle<'_> {
    fn drop(&mut self) {
        let _ = self
            .bpm
            .write()
            .unwrap()
            .unpin_page(&self.file, self.page_no, false);
    }
}

/// A handle to a pinned page frame held for writing.
///
/// Dropping the handle unpins the page and marks it dirty, scheduling a
/// write-back when the page is later evicted or flushed.
pub struct PageFrameMutHandle<'a> {
    bpm: &'a Arc<RwLock<BufferPoolManager>>,
    file: Arc<DbFile>,
    page_no: PageId,
    page_frame: &'a mut PageFrame,
    lock_guard: RwLockWriteGuard<'a, ()>,
}

impl fmt::Debug for PageFrameMutHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFrameMutHandle")
            .field("page_frame", &self.page_frame)
            .finish()
    }
}

impl<'a> PageFrameMutHandle<'a> {
    pub(crate) fn new(
        bpm: &'a Arc<RwLock<BufferPoolManager>>,
        page_frame: &'a mut PageFrame,
    ) -> Self {
        let file = page_frame
            .file()
            .cloned()
            .expect("handle constructed over an empty frame");
        let page_no = page_frame.page_no();

        let fp_ptr = &mut *page_frame as *mut PageFrame;
        // SAFETY: see `PageFrameRefHandle::new`
        let lock_guard = unsafe { (*fp_ptr).write_lock() };
        PageFrameMutHandle {
            bpm,
            file,
            page_no,
            page_frame,
            lock_guard,
        }
    }
}

impl Drop for PageFrameMutHandle<'_> {
    fn drop(&mut self) {
        let _ = self
            .bpm
            .write()
            .unwrap()
            .unpin_page(&self.file, self.page_no, true);
    }
}

impl Deref for PageFrameRefHandle<'_> {
    type Target = PageFrame;

    fn deref(&self) -> &Self::Target {
        self.page_frame
    }
}

impl Deref for PageFrameMutHandle<'_> {
    type Target = PageFrame;

    fn deref(&self) -> &Self::Target {
        self.page_frame
    }
}

impl DerefMut for PageFrameMutHandle<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.page_frame
    }
}
