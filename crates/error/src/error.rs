pub type Result<T> = std::result::Result<T, Error>;
impl<T> From<Error> for Result<T> {
    fn from(e: Error) -> Self {
        Err(e)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Invalid data, which typically indicates corrupted internal state.
    InvalidData(String),
    /// Invalid user input, such as an unallocated page number.
    InvalidInput(String),
    /// An IO error has occurred.
    IO(String),
    /// Every frame in the buffer pool is pinned; nothing can be evicted.
    PoolExhausted,
    /// The page cannot be unpinned because its pin count is already zero.
    NotPinned(u32),
    /// The page cannot be flushed or disposed because it is still pinned.
    PagePinned(u32),
    /// An invalid frame still claims to belong to a file; the frame table
    /// bookkeeping is corrupted.
    BadBuffer(usize),
    /// The requested key is not present in the page table.
    NotFound,
    /// The key is already present in the page table.
    DuplicateKey,
}

impl std::error::Error for Error {}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::IO(msg) => write!(f, "IO error: {}", msg),
            Error::PoolExhausted => write!(f, "All buffer frames are pinned"),
            Error::NotPinned(page_no) => {
                write!(f, "Cannot unpin page {}: pin count is already 0", page_no)
            }
            Error::PagePinned(page_no) => {
                write!(f, "Cannot release page {}: page is still pinned", page_no)
            }
            Error::BadBuffer(frame_id) => {
                write!(f, "Frame {} is invalid but still references a file", frame_id)
            }
            Error::NotFound => write!(f, "Key not found in page table"),
            Error::DuplicateKey => write!(f, "Key already present in page table"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IO(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        // This occurs when a different thread panics when holding a mutex. Since this is
        // fatal, we should panic here too.
        panic!("{e}")
    }
}
