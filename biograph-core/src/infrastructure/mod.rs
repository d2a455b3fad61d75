//! Infrastructure implementations

pub mod auth;
pub mod storage;

pub use storage::{MemoryStorage, RedisStorage, StorageBackend, StorageError};
