//! Redis storage backend

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{debug, error};

use super::{StorageBackend, StorageError};

// Token-checked delete; the token comparison and the DEL must be one step or
// a lock that expired mid-release could delete another holder's acquisition.
const DELETE_IF_EQUAL_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Redis-backed storage, shared by every worker process in a deployment.
pub struct RedisStorage {
    connection_manager: ConnectionManager,
}

impl RedisStorage {
    /// Connect to Redis and verify the connection with a PING.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let client = Client::open(url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            StorageError::Unavailable(format!("invalid Redis URL: {}", e))
        })?;

        let connection_manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to create Redis connection manager: {}", e);
            StorageError::Unavailable(format!("failed to connect: {}", e))
        })?;

        let mut conn = connection_manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| {
                error!("Failed to ping Redis: {}", e);
                StorageError::Unavailable(format!("ping failed: {}", e))
            })?;

        debug!("Connected to Redis at {}", url);

        Ok(Self { connection_manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.connection_manager.clone()
    }
}

fn unavailable(op: &str, key: &str, e: redis::RedisError) -> StorageError {
    error!("Redis {} failed for key {}: {}", op, key, e);
    StorageError::Unavailable(format!("{} {}: {}", op, key, e))
}

#[async_trait]
impl StorageBackend for RedisStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.conn();
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| unavailable("GET", key, e))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut conn = self.conn();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| unavailable("SET", key, e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let mut conn = self.conn();
        let deleted = redis::cmd("DEL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| unavailable("DEL", key, e))?;
        Ok(deleted > 0)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        let mut conn = self.conn();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis() as u64);
        }
        // SET ... NX replies OK on success and nil when the key exists
        let reply = cmd
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| unavailable("SET NX", key, e))?;
        Ok(reply.is_some())
    }

    async fn delete_if_equal(&self, key: &str, value: &str) -> Result<bool, StorageError> {
        let mut conn = self.conn();
        let deleted = redis::cmd("EVAL")
            .arg(DELETE_IF_EQUAL_SCRIPT)
            .arg(1)
            .arg(key)
            .arg(value)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| unavailable("EVAL", key, e))?;
        Ok(deleted > 0)
    }

    async fn push(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut conn = self.conn();
        redis::cmd("LPUSH")
            .arg(key)
            .arg(value)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| unavailable("LPUSH", key, e))?;
        Ok(())
    }

    async fn pop_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StorageError> {
        let mut conn = self.conn();
        // BRPOP returns [key, value] or nil on timeout
        let reply = redis::cmd("BRPOP")
            .arg(key)
            .arg(timeout.as_secs_f64())
            .query_async::<Option<(String, String)>>(&mut conn)
            .await
            .map_err(|e| unavailable("BRPOP", key, e))?;
        Ok(reply.map(|(_, value)| value))
    }
}
