use core::fmt;

use bytes::Bytes;

use crate::typedef::PageId;

pub const INVALID_PAGE_ID: PageId = 0;
pub const PAGE_SIZE: usize = 4096;

/// A page as it travels between the buffer pool and a database file: an
/// opaque, page-sized byte payload tagged with the number of the disk page
/// it belongs to.
#[derive(Clone)]
pub struct Page {
    page_no: PageId,
    data: Bytes,
}

impl Page {
    pub(crate) fn new(page_no: PageId, data: Bytes) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Self { page_no, data }
    }

    /// The disk page this payload belongs to.
    pub fn page_number(&self) -> PageId {
        self.page_no
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("page_no", &self.page_no)
            .finish()
    }
}
