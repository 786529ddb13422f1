//! Storage for the files of a book under construction.

mod storage;

pub use storage::{FsStorage, MemoryStorage, Storage, Store};
