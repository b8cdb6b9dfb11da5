use std::sync::{Arc, RwLock};

use burrowdb_error::Error;
use tracing::{debug, error, warn};

use crate::disk::db_file::DbFile;
use crate::frame::PageFrame;
use crate::frame_handle::{PageFrameMutHandle, PageFrameRefHandle};
use crate::page_table::PageTable;
use crate::replacer::clock::ClockReplacer;
use crate::typedef::{FileId, FrameId, PageId};
use crate::Result;

/// Manages page admission, pinning, write-back, and eviction over a fixed
/// set of page-sized frames.
///
/// Pool capacity is the only configuration parameter and is immutable after
/// construction. The pool owns the frame memory; the files it caches pages
/// for are shared collaborators that outlive their residency.
#[derive(Debug)]
pub struct BufferPoolManager {
    frames: Vec<PageFrame>,
    page_table: PageTable, // Maps (file, page) pairs to frame ids
    replacer: ClockReplacer,
}

impl BufferPoolManager {
    /// Initializes the buffer pool with `pool_size` frames.
    pub fn new(pool_size: usize) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        frames.resize_with(pool_size, PageFrame::new);

        Self {
            frames,
            page_table: PageTable::with_pool_size(pool_size),
            replacer: ClockReplacer::new(pool_size),
        }
    }

    /// Returns an empty frame, evicting the clock victim's current page if
    /// necessary.
    ///
    /// If the dirty write-back fails, the frame keeps its page and its
    /// page-table mapping, so the pool stays consistent and a later call can
    /// retry the eviction.
    fn get_free_frame(&mut self) -> Result<FrameId> {
        let frame_id = self.replacer.pick_victim(&mut self.frames)?;

        let frame = &self.frames[frame_id];
        if frame.is_valid() {
            assert_eq!(
                frame.pin_count(),
                0,
                "clock selected a pinned frame for eviction"
            );
            let file = frame.file().cloned().ok_or(Error::BadBuffer(frame_id))?;
            let page_no = frame.page_no();

            if frame.is_dirty() {
                file.write_page(&frame.to_page())?;
            }
            self.page_table.remove(FileId::of(&file), page_no)?;
            debug!(frame_id, page_no, file = %file.filename(), "evicted page");
        }

        self.frames[frame_id].reset();
        Ok(frame_id)
    }

    /// Pins the page `(file, page_no)` into a frame, loading it from disk on
    /// a miss, and returns a shared reference to the frame.
    ///
    /// A failed disk read leaves the chosen frame empty and the page table
    /// untouched.
    pub fn read_page(&mut self, file: &Arc<DbFile>, page_no: PageId) -> Result<&PageFrame> {
        if let Some(frame_id) = self.page_table.lookup(FileId::of(file), page_no) {
            let frame = &mut self.frames[frame_id];
            frame.set_refbit(true);
            frame.increment_pin_count();
            return Ok(&self.frames[frame_id]);
        }

        let frame_id = self.get_free_frame()?;
        let page = file.read_page(page_no)?;
        self.page_table.insert(FileId::of(file), page_no, frame_id)?;
        let frame = &mut self.frames[frame_id];
        frame.set(Arc::clone(file), page_no);
        frame.copy_from_page(&page);
        Ok(&self.frames[frame_id])
    }

    /// Like [`BufferPoolManager::read_page`], but returns a mutable
    /// reference for callers that intend to modify the page.
    pub fn read_page_mut(&mut self, file: &Arc<DbFile>, page_no: PageId) -> Result<&mut PageFrame> {
        if let Some(frame_id) = self.page_table.lookup(FileId::of(file), page_no) {
            let frame = &mut self.frames[frame_id];
            frame.set_refbit(true);
            frame.increment_pin_count();
            return Ok(&mut self.frames[frame_id]);
        }

        let frame_id = self.get_free_frame()?;
        let page = file.read_page(page_no)?;
        self.page_table.insert(FileId::of(file), page_no, frame_id)?;
        let frame = &mut self.frames[frame_id];
        frame.set(Arc::clone(file), page_no);
        frame.copy_from_page(&page);
        Ok(&mut self.frames[frame_id])
    }

    /// Allocates a fresh page in `file` and pins it into a frame. The new
    /// page number is available through the returned frame.
    pub fn alloc_page(&mut self, file: &Arc<DbFile>) -> Result<&mut PageFrame> {
        let frame_id = self.get_free_frame()?;
        let page = file.allocate_page()?;
        let page_no = page.page_number();
        self.page_table.insert(FileId::of(file), page_no, frame_id)?;
        let frame = &mut self.frames[frame_id];
        frame.set(Arc::clone(file), page_no);
        frame.copy_from_page(&page);
        Ok(frame)
    }

    /// Releases one pin on `(file, page_no)`, recording `dirty` if the
    /// caller modified the page. The dirty bit is only ever raised here; it
    /// is cleared by write-back.
    ///
    /// Unpinning a page that is not resident succeeds silently: callers may
    /// hold identities that went stale after a `flush_file`.
    pub fn unpin_page(&mut self, file: &Arc<DbFile>, page_no: PageId, dirty: bool) -> Result<()> {
        let Some(frame_id) = self.page_table.lookup(FileId::of(file), page_no) else {
            return Ok(());
        };

        let frame = &mut self.frames[frame_id];
        if frame.pin_count() == 0 {
            return Err(Error::NotPinned(page_no));
        }
        frame.decrement_pin_count();
        if dirty {
            frame.set_dirty(true);
        }
        Ok(())
    }

    /// Writes back and releases every page of `file` resident in the pool.
    ///
    /// Fails with `PagePinned` on the first pinned page encountered; frames
    /// already processed stay flushed (a best-effort partial flush), frames
    /// after the offending one are untouched. `BadBuffer` reports an invalid
    /// frame still referencing the file, which a healthy pool cannot
    /// produce: resetting a frame drops its file reference.
    pub fn flush_file(&mut self, file: &Arc<DbFile>) -> Result<()> {
        let file_id = FileId::of(file);
        for frame_id in 0..self.frames.len() {
            let frame = &self.frames[frame_id];
            if frame.file_id() != Some(file_id) {
                continue;
            }
            if !frame.is_valid() {
                return Err(Error::BadBuffer(frame_id));
            }
            let page_no = frame.page_no();
            if frame.pin_count() > 0 {
                return Err(Error::PagePinned(page_no));
            }

            if frame.is_dirty() {
                file.write_page(&frame.to_page())?;
                self.frames[frame_id].set_dirty(false);
            }
            self.page_table.remove(file_id, page_no)?;
            self.frames[frame_id].reset();
        }
        Ok(())
    }

    /// Deletes `page_no` from `file`, releasing its frame first if the page
    /// is resident.
    ///
    /// The resident copy is discarded without write-back: the page is about
    /// to be deallocated, so flushing it would be wasted IO. Disposal of a
    /// pinned page fails with `PagePinned`.
    pub fn dispose_page(&mut self, file: &Arc<DbFile>, page_no: PageId) -> Result<()> {
        let file_id = FileId::of(file);
        if let Some(frame_id) = self.page_table.lookup(file_id, page_no) {
            if self.frames[frame_id].pin_count() > 0 {
                return Err(Error::PagePinned(page_no));
            }
            self.page_table.remove(file_id, page_no)?;
            self.frames[frame_id].reset();
        }
        file.delete_page(page_no)
    }

    /// Returns the pin count of a resident page, or `None` when the page is
    /// not in the pool.
    pub fn pin_count(&self, file: &Arc<DbFile>, page_no: PageId) -> Option<u16> {
        let frame_id = self.page_table.lookup(FileId::of(file), page_no)?;
        Some(self.frames[frame_id].pin_count())
    }

    /// Number of pages currently resident in the pool.
    pub fn resident_page_count(&self) -> usize {
        self.page_table.len()
    }

    /// Pins a fresh page and returns a write handle for it.
    pub fn alloc_page_handle<'a>(
        bpm: &'a Arc<RwLock<BufferPoolManager>>,
        file: &Arc<DbFile>,
    ) -> Result<PageFrameMutHandle<'a>> {
        let page_frame = {
            let mut bpm_guard = bpm.write()?;
            // SAFETY:
            // The handle must carry both the pool Arc and a reference to a
            // frame inside it, but `alloc_page` ties the frame reference to
            // the lifetime of `bpm_guard`, so the borrow checker rejects the
            // pair. We extract the frame through a raw pointer to end the
            // guard's borrow early. The frame lives in a Vec whose length is
            // fixed at construction and cannot be evicted while it holds the
            // pin taken here, so the reference stays valid for the handle's
            // lifetime.
            let bpm_ptr = &mut *bpm_guard as *mut BufferPoolManager;
            unsafe { (*bpm_ptr).alloc_page(file)? }
        };

        Ok(PageFrameMutHandle::new(bpm, page_frame))
    }

    /// Pins `(file, page_no)` and returns a read handle for it.
    pub fn read_page_handle<'a>(
        bpm: &'a Arc<RwLock<BufferPoolManager>>,
        file: &Arc<DbFile>,
        page_no: PageId,
    ) -> Result<PageFrameRefHandle<'a>> {
        let page_frame = {
            let mut bpm_guard = bpm.write()?;
            // SAFETY: see `alloc_page_handle`
            let bpm_ptr = &mut *bpm_guard as *mut BufferPoolManager;
            unsafe { (*bpm_ptr).read_page(file, page_no)? }
        };

        Ok(PageFrameRefHandle::new(bpm, page_frame))
    }

    /// Pins `(file, page_no)` and returns a write handle for it.
    pub fn read_page_mut_handle<'a>(
        bpm: &'a Arc<RwLock<BufferPoolManager>>,
        file: &Arc<DbFile>,
        page_no: PageId,
    ) -> Result<PageFrameMutHandle<'a>> {
        let page_frame = {
            let mut bpm_guard = bpm.write()?;
            // SAFETY: see `alloc_page_handle`
            let bpm_ptr = &mut *bpm_guard as *mut BufferPoolManager;
            unsafe { (*bpm_ptr).read_page_mut(file, page_no)? }
        };

        Ok(PageFrameMutHandle::new(bpm, page_frame))
    }
}

impl Drop for BufferPoolManager {
    /// Flushes every dirty page through its owning file before the pool
    /// memory is released. A page still pinned at teardown is a caller bug;
    /// it is logged and written back anyway rather than aborting.
    fn drop(&mut self) {
        for (frame_id, frame) in self.frames.iter().enumerate() {
            if !frame.is_valid() {
                continue;
            }
            if frame.pin_count() > 0 {
                warn!(
                    frame_id,
                    page_no = frame.page_no(),
                    "buffer pool dropped while page is pinned"
                );
            }
            if !frame.is_dirty() {
                continue;
            }
            match frame.file() {
                Some(file) => {
                    if let Err(e) = file.write_page(&frame.to_page()) {
                        error!(
                            frame_id,
                            page_no = frame.page_no(),
                            "write-back failed during teardown: {e}"
                        );
                    }
                }
                None => error!(frame_id, "valid frame without an owning file"),
            }
        }
    }
}

#[cfg(test)]
impl BufferPoolManager {
    /// Asserts the structural invariants tying the frames to the page
    /// table: a frame is valid iff exactly one table entry maps to it, no
    /// frame is mapped twice, and dirty/reference bits only decorate valid
    /// frames.
    fn assert_invariants(&self) {
        let mut mapped = std::collections::HashSet::new();
        for (file_id, page_no, frame_id) in self.page_table.entries() {
            assert!(mapped.insert(frame_id), "frame {frame_id} mapped twice");
            let frame = &self.frames[frame_id];
            assert!(frame.is_valid(), "mapped frame {frame_id} is not valid");
            assert_eq!(frame.file_id(), Some(file_id));
            assert_eq!(frame.page_no(), page_no);
        }
        for (frame_id, frame) in self.frames.iter().enumerate() {
            assert_eq!(frame.is_valid(), mapped.contains(&frame_id));
            if !frame.is_valid() {
                assert!(frame.file().is_none());
                assert!(!frame.is_dirty());
                assert!(!frame.refbit());
                assert_eq!(frame.pin_count(), 0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PAGE_SIZE;
    use rand::{rng, Rng};
    use serial_test::serial;
    use std::thread;
    use tempfile::TempDir;

    fn test_file(dir: &TempDir, name: &str) -> Arc<DbFile> {
        Arc::new(DbFile::create(dir.path().join(name)).unwrap())
    }

    fn bpm_arc(pool_size: usize) -> Arc<RwLock<BufferPoolManager>> {
        Arc::new(RwLock::new(BufferPoolManager::new(pool_size)))
    }

    /// Allocates `n` pages through the pool and unpins them all, returning
    /// their page numbers.
    fn alloc_unpinned_pages(
        bpm: &mut BufferPoolManager,
        file: &Arc<DbFile>,
        n: usize,
    ) -> Vec<PageId> {
        let mut pids = Vec::with_capacity(n);
        for _ in 0..n {
            let pid = bpm.alloc_page(file).unwrap().page_no();
            bpm.unpin_page(file, pid, false).unwrap();
            pids.push(pid);
        }
        pids
    }

    #[test]
    fn test_repeated_reads_share_a_frame() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "share.db");
        let mut bpm = BufferPoolManager::new(3);

        let pid = bpm.alloc_page(&file).unwrap().page_no();
        bpm.unpin_page(&file, pid, false).unwrap();
        bpm.assert_invariants();

        bpm.read_page(&file, pid).unwrap();
        bpm.read_page(&file, pid).unwrap();
        assert_eq!(bpm.pin_count(&file, pid), Some(2));
        assert_eq!(bpm.resident_page_count(), 1);
        bpm.assert_invariants();

        bpm.unpin_page(&file, pid, false).unwrap();
        bpm.unpin_page(&file, pid, false).unwrap();
        assert_eq!(bpm.pin_count(&file, pid), Some(0));

        // A third unpin underflows the pin count and must be rejected.
        assert_eq!(
            bpm.unpin_page(&file, pid, false),
            Err(Error::NotPinned(pid))
        );
        bpm.assert_invariants();
    }

    #[test]
    fn test_read_then_unpin_restores_pool_state() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "law.db");
        let mut bpm = BufferPoolManager::new(2);

        let pid = bpm.alloc_page(&file).unwrap().page_no();
        bpm.unpin_page(&file, pid, false).unwrap();

        bpm.read_page(&file, pid).unwrap();
        bpm.unpin_page(&file, pid, false).unwrap();

        assert_eq!(bpm.pin_count(&file, pid), Some(0));
        assert_eq!(bpm.resident_page_count(), 1);
        bpm.assert_invariants();
    }

    #[test]
    #[serial]
    fn test_sequential_fill_evicts_oldest_page() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "fill.db");

        // Seed the file with four pages through a scratch pool.
        let pids = {
            let mut seeder = BufferPoolManager::new(4);
            alloc_unpinned_pages(&mut seeder, &file, 4)
        };

        let mut bpm = BufferPoolManager::new(3);
        for &pid in &pids[..3] {
            bpm.read_page(&file, pid).unwrap();
            bpm.unpin_page(&file, pid, false).unwrap();
        }
        bpm.assert_invariants();

        // Admitting the fourth page must evict the first: the oldest
        // unpinned resident whose reference bit was never raised by a hit.
        bpm.read_page(&file, pids[3]).unwrap();
        assert_eq!(bpm.pin_count(&file, pids[0]), None);
        assert_eq!(bpm.pin_count(&file, pids[3]), Some(1));
        assert_eq!(bpm.resident_page_count(), 3);
        bpm.assert_invariants();
    }

    #[test]
    #[serial]
    fn test_dirty_eviction_writes_back_before_reload() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "dirty.db");
        let mut bpm = BufferPoolManager::new(1);

        let payload = b"must survive eviction";
        let pid = {
            let frame = bpm.alloc_page(&file).unwrap();
            frame.write(0, payload);
            frame.page_no()
        };
        bpm.unpin_page(&file, pid, true).unwrap();

        // Admitting a second page into the only frame forces the dirty
        // write-back of the first.
        let pid2 = bpm.alloc_page(&file).unwrap().page_no();
        assert_eq!(bpm.pin_count(&file, pid), None);
        bpm.assert_invariants();

        // The on-disk copy now carries the modification.
        let on_disk = file.read_page(pid).unwrap();
        assert_eq!(&on_disk.data()[..payload.len()], payload);

        bpm.unpin_page(&file, pid2, false).unwrap();

        // And reloading through the pool observes it too.
        let frame = bpm.read_page(&file, pid).unwrap();
        assert_eq!(&frame.data()[..payload.len()], payload);
    }

    #[test]
    fn test_all_pinned_pool_is_exhausted() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "exhausted.db");
        let mut bpm = BufferPoolManager::new(2);

        let pid1 = bpm.alloc_page(&file).unwrap().page_no();
        let _pid2 = bpm.alloc_page(&file).unwrap().page_no();

        assert_eq!(bpm.alloc_page(&file).unwrap_err(), Error::PoolExhausted);

        // Hits on resident pages still succeed while the pool is full.
        bpm.read_page(&file, pid1).unwrap();
        assert_eq!(bpm.pin_count(&file, pid1), Some(2));
        bpm.assert_invariants();
    }

    #[test]
    fn test_single_frame_pool_exhaustion() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "single.db");

        // Seed two pages.
        let pids = {
            let mut seeder = BufferPoolManager::new(2);
            alloc_unpinned_pages(&mut seeder, &file, 2)
        };

        let mut bpm = BufferPoolManager::new(1);
        bpm.read_page(&file, pids[0]).unwrap();
        assert_eq!(
            bpm.read_page(&file, pids[1]).unwrap_err(),
            Error::PoolExhausted
        );

        // The failed admission left no trace of the second page.
        assert_eq!(bpm.pin_count(&file, pids[1]), None);
        assert_eq!(bpm.pin_count(&file, pids[0]), Some(1));
        bpm.assert_invariants();
    }

    #[test]
    fn test_unpin_of_absent_page_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "absent.db");
        let mut bpm = BufferPoolManager::new(2);

        assert!(bpm.unpin_page(&file, 999, false).is_ok());
        assert_eq!(bpm.resident_page_count(), 0);
        bpm.assert_invariants();
    }

    #[test]
    fn test_flush_file_with_pinned_page_fails() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "flush_pinned.db");
        let mut bpm = BufferPoolManager::new(3);

        let pinned = bpm.alloc_page(&file).unwrap().page_no();
        let clean = bpm.alloc_page(&file).unwrap().page_no();
        bpm.unpin_page(&file, clean, false).unwrap();

        assert_eq!(bpm.flush_file(&file), Err(Error::PagePinned(pinned)));

        // The clean page sitting behind the pinned one is untouched.
        assert_eq!(bpm.pin_count(&file, clean), Some(0));
        assert_eq!(bpm.pin_count(&file, pinned), Some(1));
        bpm.assert_invariants();
    }

    #[test]
    #[serial]
    fn test_flush_file_writes_back_and_releases() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "flush.db");
        let other = test_file(&dir, "flush_other.db");
        let mut bpm = BufferPoolManager::new(4);

        let payload = b"flushed payload";
        let pid = {
            let frame = bpm.alloc_page(&file).unwrap();
            frame.write(0, payload);
            frame.page_no()
        };
        bpm.unpin_page(&file, pid, true).unwrap();

        let clean = bpm.alloc_page(&file).unwrap().page_no();
        bpm.unpin_page(&file, clean, false).unwrap();

        // A resident page of another file must not be swept up.
        let other_pid = bpm.alloc_page(&other).unwrap().page_no();
        bpm.unpin_page(&other, other_pid, false).unwrap();

        bpm.flush_file(&file).unwrap();

        assert_eq!(bpm.pin_count(&file, pid), None);
        assert_eq!(bpm.pin_count(&file, clean), None);
        assert_eq!(bpm.pin_count(&other, other_pid), Some(0));
        assert_eq!(bpm.resident_page_count(), 1);
        bpm.assert_invariants();

        let on_disk = file.read_page(pid).unwrap();
        assert_eq!(&on_disk.data()[..payload.len()], payload);

        // Unpinning through the now-stale identity still succeeds silently.
        assert!(bpm.unpin_page(&file, pid, false).is_ok());
    }

    #[test]
    #[serial]
    fn test_dispose_resident_dirty_page_discards_it() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "dispose.db");
        let mut bpm = BufferPoolManager::new(2);

        let pid = {
            let frame = bpm.alloc_page(&file).unwrap();
            frame.write(0, b"doomed");
            frame.page_no()
        };
        bpm.unpin_page(&file, pid, true).unwrap();

        bpm.dispose_page(&file, pid).unwrap();

        // No residue in the pool, and the page is gone from the file.
        assert_eq!(bpm.pin_count(&file, pid), None);
        assert_eq!(bpm.resident_page_count(), 0);
        assert!(file.read_page(pid).is_err());
        bpm.assert_invariants();
    }

    #[test]
    fn test_dispose_absent_page_still_deletes_from_file() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "dispose_absent.db");
        let mut bpm = BufferPoolManager::new(2);

        let pid = bpm.alloc_page(&file).unwrap().page_no();
        bpm.unpin_page(&file, pid, false).unwrap();
        bpm.flush_file(&file).unwrap();

        bpm.dispose_page(&file, pid).unwrap();
        assert!(file.read_page(pid).is_err());
        bpm.assert_invariants();
    }

    #[test]
    fn test_dispose_pinned_page_fails() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "dispose_pinned.db");
        let mut bpm = BufferPoolManager::new(2);

        let pid = bpm.alloc_page(&file).unwrap().page_no();
        assert_eq!(bpm.dispose_page(&file, pid), Err(Error::PagePinned(pid)));

        bpm.unpin_page(&file, pid, false).unwrap();
        assert!(bpm.dispose_page(&file, pid).is_ok());
        bpm.assert_invariants();
    }

    #[test]
    #[serial]
    fn test_clock_gives_second_chances_before_evicting() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "second_chance.db");
        let mut bpm = BufferPoolManager::new(3);

        // Fill the pool, then hit every page once so all reference bits are
        // raised, and unpin everything.
        let pids = alloc_unpinned_pages(&mut bpm, &file, 3);
        for &pid in &pids {
            bpm.read_page(&file, pid).unwrap();
            bpm.unpin_page(&file, pid, false).unwrap();
        }

        // The next admission sweeps once to clear all three bits and then
        // selects frame 0, evicting the first page.
        let pid4 = bpm.alloc_page(&file).unwrap().page_no();
        assert_eq!(bpm.pin_count(&file, pids[0]), None);
        assert_eq!(bpm.pin_count(&file, pids[1]), Some(0));
        assert_eq!(bpm.pin_count(&file, pids[2]), Some(0));
        assert_eq!(bpm.pin_count(&file, pid4), Some(1));
        bpm.assert_invariants();
    }

    #[test]
    fn test_distinct_files_are_distinct_keys() {
        let dir = TempDir::new().unwrap();
        let file_a = test_file(&dir, "keys_a.db");
        let file_b = test_file(&dir, "keys_b.db");
        let mut bpm = BufferPoolManager::new(4);

        // Both files hand out page number 1; the pool must keep them apart.
        let pid_a = bpm.alloc_page(&file_a).unwrap().page_no();
        let pid_b = bpm.alloc_page(&file_b).unwrap().page_no();
        assert_eq!(pid_a, pid_b);

        let frame_a = bpm.read_page(&file_a, pid_a).unwrap();
        let marker = frame_a.page_no();
        assert_eq!(marker, pid_a);
        bpm.unpin_page(&file_a, pid_a, false).unwrap();

        assert_eq!(bpm.resident_page_count(), 2);
        assert_eq!(bpm.pin_count(&file_a, pid_a), Some(1));
        assert_eq!(bpm.pin_count(&file_b, pid_b), Some(1));
        bpm.assert_invariants();
    }

    #[test]
    #[serial]
    fn test_drop_flushes_dirty_pages() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "teardown.db");
        let payload = b"written at teardown";

        let pid = {
            let mut bpm = BufferPoolManager::new(2);
            let frame = bpm.alloc_page(&file).unwrap();
            frame.write(0, payload);
            let pid = frame.page_no();
            bpm.unpin_page(&file, pid, true).unwrap();
            pid
        };

        let on_disk = file.read_page(pid).unwrap();
        assert_eq!(&on_disk.data()[..payload.len()], payload);
    }

    #[test]
    #[serial]
    fn test_random_payload_survives_eviction() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "random.db");
        let mut bpm = BufferPoolManager::new(2);

        let mut rng = rng();
        let mut payload = vec![0u8; PAGE_SIZE];
        for byte in &mut payload {
            *byte = rng.random();
        }

        let pid = {
            let frame = bpm.alloc_page(&file).unwrap();
            frame.write(0, &payload);
            frame.page_no()
        };
        bpm.unpin_page(&file, pid, true).unwrap();

        // Push the page out through normal replacement traffic.
        alloc_unpinned_pages(&mut bpm, &file, 4);
        assert_eq!(bpm.pin_count(&file, pid), None);

        let frame = bpm.read_page(&file, pid).unwrap();
        assert_eq!(frame.data(), &payload[..]);
    }

    #[test]
    fn test_handles_unpin_on_drop() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "handles.db");
        let bpm = bpm_arc(2);

        let pid = {
            let handle = BufferPoolManager::alloc_page_handle(&bpm, &file).unwrap();
            handle.page_no()
        };
        assert_eq!(bpm.read().unwrap().pin_count(&file, pid), Some(0));

        {
            let _first = BufferPoolManager::read_page_handle(&bpm, &file, pid).unwrap();
            let _second = BufferPoolManager::read_page_handle(&bpm, &file, pid).unwrap();
            assert_eq!(bpm.read().unwrap().pin_count(&file, pid), Some(2));
        }
        assert_eq!(bpm.read().unwrap().pin_count(&file, pid), Some(0));
    }

    #[test]
    #[serial]
    fn test_mut_handle_marks_page_dirty() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "handle_dirty.db");
        let bpm = bpm_arc(1);
        let payload = b"handle payload";

        let pid = {
            let mut handle = BufferPoolManager::alloc_page_handle(&bpm, &file).unwrap();
            handle.write(0, payload);
            handle.page_no()
        };

        // Dropping the write handle unpinned the page dirty; squeezing it
        // out of the single frame forces the write-back.
        let _other = BufferPoolManager::alloc_page_handle(&bpm, &file).unwrap();
        let on_disk = file.read_page(pid).unwrap();
        assert_eq!(&on_disk.data()[..payload.len()], payload);
    }

    #[test]
    fn test_handle_read_write_round_trip() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "roundtrip.db");
        let bpm = bpm_arc(4);
        let payload = b"Hello, world!";

        let pid = {
            let handle = BufferPoolManager::alloc_page_handle(&bpm, &file).unwrap();
            handle.page_no()
        };

        {
            let mut write_guard =
                BufferPoolManager::read_page_mut_handle(&bpm, &file, pid).unwrap();
            write_guard.write(0, payload);
            assert_eq!(&write_guard.data()[..payload.len()], payload);
        }

        {
            let read_guard = BufferPoolManager::read_page_handle(&bpm, &file, pid).unwrap();
            assert_eq!(&read_guard.data()[..payload.len()], payload);
        }
    }

    #[test]
    #[serial]
    fn test_concurrent_writers_on_one_page() {
        let rounds = 200;
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "contention.db");
        let bpm = bpm_arc(4);

        let pid = {
            let handle = BufferPoolManager::alloc_page_handle(&bpm, &file).unwrap();
            handle.page_no()
        };

        let mut threads = vec![];
        for _ in 0..4 {
            let local_bpm = Arc::clone(&bpm);
            let local_file = Arc::clone(&file);
            threads.push(thread::spawn(move || {
                for i in 0..rounds {
                    let mut handle =
                        BufferPoolManager::read_page_mut_handle(&local_bpm, &local_file, pid)
                            .expect("Failed to fetch page for writing");
                    let data = i.to_string().into_bytes();
                    handle.write(0, &data);
                }
            }));
        }
        for handle in threads {
            handle.join().expect("Writer thread panicked");
        }

        // Every pin taken by the writers was released.
        assert_eq!(bpm.read().unwrap().pin_count(&file, pid), Some(0));
    }

    #[test]
    #[serial]
    fn test_concurrent_readers_share_one_admission() {
        let dir = TempDir::new().unwrap();
        let file = test_file(&dir, "shared_read.db");
        let bpm = bpm_arc(2);

        let pid = {
            let mut handle = BufferPoolManager::alloc_page_handle(&bpm, &file).unwrap();
            handle.write(0, b"shared");
            handle.page_no()
        };

        let mut threads = vec![];
        for _ in 0..8 {
            let local_bpm = Arc::clone(&bpm);
            let local_file = Arc::clone(&file);
            threads.push(thread::spawn(move || {
                let handle = BufferPoolManager::read_page_handle(&local_bpm, &local_file, pid)
                    .expect("Failed to fetch page for reading");
                assert_eq!(&handle.data()[..6], b"shared");
            }));
        }
        for handle in threads {
            handle.join().expect("Reader thread panicked");
        }

        // One frame served every reader.
        assert_eq!(bpm.read().unwrap().resident_page_count(), 1);
        assert_eq!(bpm.read().unwrap().pin_count(&file, pid), Some(0));
    }
}
