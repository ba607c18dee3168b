//! Storage backends for index directories.
//!
//! A [`Storage`] is a flat namespace of files underneath one index. The
//! registry opens a [`FileStorage`] per index directory; [`MemoryStorage`]
//! backs tests that do not need a disk.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use traits::{Storage, StorageConfig, StorageError, StorageInput, StorageOutput};
