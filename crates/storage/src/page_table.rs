use std::collections::hash_map::Entry;
use std::collections::HashMap;

use burrowdb_error::Error;

use crate::typedef::{FileId, FrameId, PageId};
use crate::Result;

/// Associative index from `(file, page)` pairs to the frames caching them.
///
/// The table is the single source of truth for residency: a page is in the
/// pool exactly when it has an entry here.
#[derive(Debug)]
pub(crate) struct PageTable {
    map: HashMap<(FileId, PageId), FrameId>,
}

impl PageTable {
    /// Sized at roughly 1.2x the pool capacity. Residency is bounded by the
    /// pool, so the table never grows past its initial allocation.
    pub(crate) fn with_pool_size(pool_size: usize) -> Self {
        Self {
            map: HashMap::with_capacity(pool_size + pool_size / 5 + 1),
        }
    }

    pub(crate) fn insert(
        &mut self,
        file_id: FileId,
        page_no: PageId,
        frame_id: FrameId,
    ) -> Result<()> {
        match self.map.entry((file_id, page_no)) {
            Entry::Occupied(_) => Err(Error::DuplicateKey),
            Entry::Vacant(slot) => {
                slot.insert(frame_id);
                Ok(())
            }
        }
    }

    /// `Some(frame)` is a hit, `None` a miss. A miss is not an error at this
    /// level; `read_page` uses it to trigger a load, and unpin/dispose
    /// deliberately ignore it.
    pub(crate) fn lookup(&self, file_id: FileId, page_no: PageId) -> Option<FrameId> {
        self.map.get(&(file_id, page_no)).copied()
    }

    pub(crate) fn remove(&mut self, file_id: FileId, page_no: PageId) -> Result<FrameId> {
        self.map.remove(&(file_id, page_no)).ok_or(Error::NotFound)
    }

    /// Number of resident pages.
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (FileId, PageId, FrameId)> + '_ {
        self.map
            .iter()
            .map(|(&(file_id, page_no), &frame_id)| (file_id, page_no, frame_id))
    }
}
