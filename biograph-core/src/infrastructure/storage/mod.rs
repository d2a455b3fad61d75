//! Storage backend abstraction
//!
//! Everything the job subsystem persists - job records, the deduplication
//! index, distributed locks, the durable job queue and static-file flags -
//! goes through [`StorageBackend`]. The trait is deliberately string-valued
//! and object-safe so components can hold an `Arc<dyn StorageBackend>` and
//! tests can substitute [`MemoryStorage`] for the Redis deployment backend.

mod memory;
mod redis_store;

pub use memory::MemoryStorage;
pub use redis_store::RedisStorage;

use std::time::Duration;

use async_trait::async_trait;

/// Storage backend errors.
///
/// The backend being unreachable is the only failure mode callers can do
/// anything about; everything maps onto it.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Key-value and list operations shared by all worker processes.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Set `key` to `value` only if absent, optionally expiring after `ttl`.
    /// Returns whether the value was written. This is the primitive behind
    /// the distributed lock.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError>;

    /// Delete `key` only while it still holds `value`, atomically. Returns
    /// whether a deletion happened. Used for token-checked lock release.
    async fn delete_if_equal(&self, key: &str, value: &str) -> Result<bool, StorageError>;

    /// Push a value onto the head of the list at `key`.
    async fn push(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Pop from the tail of the list at `key`, blocking up to `timeout`.
    /// `None` means the timeout elapsed with the list empty.
    async fn pop_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StorageError>;
}
