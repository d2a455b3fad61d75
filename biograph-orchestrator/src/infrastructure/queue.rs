//! Durable job queue and background worker pool
//!
//! Submissions enqueue `{family, uid}` messages onto a storage-backed list;
//! a worker pool pops them and dispatches to the registered family runner.
//! Because the queue is durable and shared, queued jobs survive a process
//! restart and any worker process in the deployment may execute them.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use biograph_core::infrastructure::storage::StorageBackend;

use crate::application::runner::RunnerRegistry;

/// Message delivered to the worker pool when a job is created or resubmitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub family: String,
    pub uid: Uuid,
}

/// Errors that can occur when enqueuing or dequeuing a job.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Failed to enqueue job: {0}")]
    EnqueueFailed(String),

    #[error("Failed to dequeue job: {0}")]
    DequeueFailed(String),
}

/// Handle that allows submission paths to push jobs into the worker queue.
#[derive(Clone)]
pub struct JobQueueHandle {
    backend: Arc<dyn StorageBackend>,
    queue_key: String,
}

impl JobQueueHandle {
    pub fn new(backend: Arc<dyn StorageBackend>, queue_key: impl Into<String>) -> Self {
        Self {
            backend,
            queue_key: queue_key.into(),
        }
    }

    pub async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)
            .map_err(|e| QueueError::EnqueueFailed(e.to_string()))?;
        self.backend
            .push(&self.queue_key, &payload)
            .await
            .map_err(|e| {
                error!("Failed to enqueue job: {}", e);
                QueueError::EnqueueFailed(e.to_string())
            })
    }

    pub async fn dequeue(&self, timeout: Duration) -> Result<Option<QueuedJob>, QueueError> {
        let popped = self
            .backend
            .pop_blocking(&self.queue_key, timeout)
            .await
            .map_err(|e| QueueError::DequeueFailed(e.to_string()))?;
        match popped {
            Some(payload) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|e| QueueError::DequeueFailed(e.to_string())),
            None => Ok(None),
        }
    }
}

/// Spawn a worker pool that consumes queued jobs and runs them in the
/// background, bounded by `max_concurrent_jobs`.
pub fn spawn_job_worker_pool(
    registry: Arc<RunnerRegistry>,
    queue: JobQueueHandle,
    max_concurrent_jobs: usize,
    poll_timeout: Duration,
    shutdown: CancellationToken,
) {
    let concurrency = max_concurrent_jobs.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    tokio::spawn(async move {
        info!("Job worker pool started with concurrency: {}", concurrency);

        loop {
            // Wait for a permit before polling so a saturated pool does not
            // pull jobs it cannot start.
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    error!(error = %err, "Failed to acquire concurrency permit for job processing");
                    break;
                }
            };

            let popped = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Job worker pool shutting down");
                    break;
                }
                popped = queue.dequeue(poll_timeout) => popped,
            };

            match popped {
                Ok(Some(job)) => match registry.get(&job.family) {
                    Some(runner) => {
                        tokio::spawn(async move {
                            runner.run(job.uid).await;
                            drop(permit);
                        });
                    }
                    None => {
                        error!(family = %job.family, job_uid = %job.uid, "No runner registered for queued job");
                        drop(permit);
                    }
                },
                Ok(None) => drop(permit),
                Err(e) => {
                    error!("Failed to poll job queue: {}", e);
                    // Avoid a tight loop when the backend is down
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    drop(permit);
                }
            }
        }

        warn!("Job worker pool exiting");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use biograph_core::infrastructure::storage::MemoryStorage;

    #[tokio::test]
    async fn enqueue_dequeue_roundtrip() {
        let backend = Arc::new(MemoryStorage::new());
        let queue = JobQueueHandle::new(backend, "test:queue");

        let job = QueuedJob {
            family: "diamond".to_string(),
            uid: Uuid::new_v4(),
        };
        queue.enqueue(&job).await.unwrap();

        let popped = queue
            .dequeue(Duration::from_millis(50))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped.family, "diamond");
        assert_eq!(popped.uid, job.uid);
    }

    #[tokio::test]
    async fn dequeue_times_out_when_empty() {
        let backend = Arc::new(MemoryStorage::new());
        let queue = JobQueueHandle::new(backend, "test:queue");
        let popped = queue.dequeue(Duration::from_millis(20)).await.unwrap();
        assert!(popped.is_none());
    }
}
