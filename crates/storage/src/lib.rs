#![allow(dead_code)]
pub mod buffer_pool;
pub mod disk;
pub mod frame;
pub mod frame_handle;
pub mod page;
pub(crate) mod page_table;
pub(crate) mod replacer;
pub mod typedef;
pub type Result<T> = std::result::Result<T, burrowdb_error::Error>;
