//! Distributed mutual exclusion
//!
//! Job submission is a read-then-write against shared storage (look up an
//! equivalent job, insert if absent), and several worker processes may
//! receive equivalent requests near-simultaneously, so the check-then-act
//! race is closed with a storage-level lock rather than relying on unique
//! index semantics the backend does not have.
//!
//! A lock is `SET NX PX` with a per-acquisition token; release deletes the
//! key only while it still holds that token. The TTL is a backstop against
//! crashed holders - lock sections are store lookups and status writes, so
//! legitimate holds are milliseconds.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use uuid::Uuid;

use biograph_core::infrastructure::storage::{StorageBackend, StorageError};

const RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Lock acquisition errors
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Timed out waiting for lock {key}")]
    Timeout { key: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A named storage-backed lock shared by all worker processes.
#[derive(Clone)]
pub struct DistributedLock {
    backend: Arc<dyn StorageBackend>,
    key: String,
    ttl: Duration,
    acquire_timeout: Duration,
}

impl DistributedLock {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        key: impl Into<String>,
        ttl: Duration,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            key: key.into(),
            ttl,
            acquire_timeout,
        }
    }

    /// Lock key for a job family.
    pub fn family_key(family: &str) -> String {
        format!("lock:jobs:{}", family)
    }

    /// Block until exclusive ownership is obtained, or fail after the
    /// configured bounded wait.
    pub async fn acquire(&self) -> Result<LockGuard, LockError> {
        let token = Uuid::new_v4().to_string();
        let deadline = tokio::time::Instant::now() + self.acquire_timeout;

        loop {
            if self
                .backend
                .set_if_absent(&self.key, &token, Some(self.ttl))
                .await?
            {
                return Ok(LockGuard {
                    backend: self.backend.clone(),
                    key: self.key.clone(),
                    token,
                });
            }
            if tokio::time::Instant::now() + RETRY_INTERVAL > deadline {
                return Err(LockError::Timeout {
                    key: self.key.clone(),
                });
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }
}

/// Proof of lock ownership. Call [`LockGuard::release`] on every code path;
/// a guard that is dropped without release only frees when the TTL lapses.
#[must_use = "a lock guard that is never released holds the lock until its TTL expires"]
pub struct LockGuard {
    backend: Arc<dyn StorageBackend>,
    key: String,
    token: String,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl LockGuard {
    /// Release the lock. A failed release is logged rather than surfaced:
    /// the caller cannot do anything useful about it and the TTL bounds the
    /// damage.
    pub async fn release(self) {
        match self.backend.delete_if_equal(&self.key, &self.token).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(key = %self.key, "Lock already released or expired before release");
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to release lock; waiting for TTL");
            }
        }
    }
}
