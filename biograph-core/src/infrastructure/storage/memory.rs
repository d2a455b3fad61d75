//! In-memory storage backend
//!
//! Process-local stand-in for [`RedisStorage`], used by the test suites and
//! by single-process development deployments. Semantics (expiry on
//! `set_if_absent`, blocking list pop) mirror the Redis backend.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{StorageBackend, StorageError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory [`StorageBackend`] implementation.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Entry>>,
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    pushed: Notify,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.values.lock().expect("storage mutex poisoned")
    }

    fn lists(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<String>>> {
        self.lists.lock().expect("storage mutex poisoned")
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut values = self.values();
        match values.get(key) {
            Some(entry) if entry.expired() => {
                values.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.values().remove(key).is_some())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        let mut values = self.values();
        if values.get(key).is_some_and(|entry| !entry.expired()) {
            return Ok(false);
        }
        values.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn delete_if_equal(&self, key: &str, value: &str) -> Result<bool, StorageError> {
        let mut values = self.values();
        let matches = values
            .get(key)
            .is_some_and(|entry| !entry.expired() && entry.value == value);
        if matches {
            values.remove(key);
        }
        Ok(matches)
    }

    async fn push(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lists()
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn pop_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StorageError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register for wakeups before checking, so a push between the
            // check and the await is not lost.
            let notified = self.pushed.notified();

            if let Some(value) = self.lists().get_mut(key).and_then(VecDeque::pop_back) {
                return Ok(Some(value));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn get_set_delete_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").await.unwrap(), None);

        storage.set("k", "v").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), Some("v".to_string()));

        assert!(storage.delete("k").await.unwrap());
        assert!(!storage.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn set_if_absent_respects_existing_value() {
        let storage = MemoryStorage::new();
        assert!(storage.set_if_absent("lock", "a", None).await.unwrap());
        assert!(!storage.set_if_absent("lock", "b", None).await.unwrap());
        assert_eq!(storage.get("lock").await.unwrap(), Some("a".to_string()));
    }

    #[tokio::test]
    async fn set_if_absent_expires() {
        let storage = MemoryStorage::new();
        assert!(storage
            .set_if_absent("lock", "a", Some(Duration::from_millis(10)))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(storage.set_if_absent("lock", "b", None).await.unwrap());
    }

    #[tokio::test]
    async fn delete_if_equal_only_matches_own_token() {
        let storage = MemoryStorage::new();
        storage.set("lock", "token-a").await.unwrap();
        assert!(!storage.delete_if_equal("lock", "token-b").await.unwrap());
        assert!(storage.delete_if_equal("lock", "token-a").await.unwrap());
        assert_eq!(storage.get("lock").await.unwrap(), None);
    }

    #[tokio::test]
    async fn pop_blocking_is_fifo() {
        let storage = MemoryStorage::new();
        storage.push("q", "first").await.unwrap();
        storage.push("q", "second").await.unwrap();

        let popped = storage
            .pop_blocking("q", Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(popped, Some("first".to_string()));
    }

    #[tokio::test]
    async fn pop_blocking_times_out_on_empty_queue() {
        let storage = MemoryStorage::new();
        let popped = storage
            .pop_blocking("q", Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(popped, None);
    }

    #[tokio::test]
    async fn pop_blocking_wakes_on_push() {
        let storage = Arc::new(MemoryStorage::new());

        let popper = {
            let storage = storage.clone();
            tokio::spawn(async move { storage.pop_blocking("q", Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        storage.push("q", "item").await.unwrap();

        let popped = popper.await.unwrap().unwrap();
        assert_eq!(popped, Some("item".to_string()));
    }
}
