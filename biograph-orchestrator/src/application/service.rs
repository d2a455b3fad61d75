//! Per-family job service
//!
//! One [`JobService`] per job family wires together that family's store,
//! lock, and the shared queue. It owns the submission path (find-or-create
//! under the family lock, enqueue on creation), status reads, and
//! administrative resubmission. Families do not share state; the only
//! cross-family pieces are the queue and the static-file builder.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use biograph_core::config::JobsConfig;
use biograph_core::infrastructure::storage::StorageBackend;

use crate::domain::job::Job;
use crate::families::{JobFamily, RunnerContext};
use crate::infrastructure::job_store::{JobStore, JobStoreError};
use crate::infrastructure::lock::{DistributedLock, LockError};
use crate::infrastructure::queue::{JobQueueHandle, QueueError, QueuedJob};

/// Errors surfaced synchronously to submitting clients.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] JobStoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Submission, status and resubmission for one job family.
pub struct JobService<F: JobFamily> {
    family: Arc<F>,
    store: JobStore,
    lock: DistributedLock,
    queue: JobQueueHandle,
    ctx: RunnerContext,
}

impl<F: JobFamily> JobService<F> {
    pub fn new(
        family: Arc<F>,
        backend: Arc<dyn StorageBackend>,
        queue: JobQueueHandle,
        ctx: RunnerContext,
        jobs: &JobsConfig,
    ) -> Self {
        let name = family.name();
        let store = JobStore::new(backend.clone(), name);
        let lock = DistributedLock::new(
            backend,
            DistributedLock::family_key(name),
            Duration::from_secs(jobs.lock_ttl_seconds),
            Duration::from_millis(jobs.lock_acquire_timeout_ms),
        );
        Self {
            family,
            store,
            lock,
            queue,
            ctx,
        }
    }

    pub fn family_name(&self) -> &'static str {
        self.store.family()
    }

    pub(crate) fn family(&self) -> &F {
        &self.family
    }

    pub(crate) fn store(&self) -> &JobStore {
        &self.store
    }

    pub(crate) fn lock(&self) -> &DistributedLock {
        &self.lock
    }

    pub(crate) fn ctx(&self) -> &RunnerContext {
        &self.ctx
    }

    /// Submit a canonical request: find-or-create under the family lock and
    /// queue the job for background execution if it was created.
    ///
    /// Idempotent by canonical request - an equivalent request returns the
    /// existing UID without re-running anything.
    pub async fn submit(&self, request: F::Request) -> Result<Uuid, ServiceError> {
        let (uid, created) = self.find_or_create(&request).await?;
        if created {
            self.enqueue(uid).await?;
            info!(family = self.family_name(), job_uid = %uid, "Job submitted");
        }
        Ok(uid)
    }

    /// The find-or-create step alone, for submission paths that must place
    /// input artifacts on disk before the job becomes runnable.
    pub async fn find_or_create(
        &self,
        request: &F::Request,
    ) -> Result<(Uuid, bool), ServiceError> {
        let guard = self.lock.acquire().await?;
        let outcome = self.store.find_or_create(request).await;
        guard.release().await;
        Ok(outcome?)
    }

    /// Queue an already-created job for execution.
    pub async fn enqueue(&self, uid: Uuid) -> Result<(), ServiceError> {
        self.queue
            .enqueue(&QueuedJob {
                family: self.family_name().to_string(),
                uid,
            })
            .await?;
        Ok(())
    }

    /// The stored job document (canonical fields, status, error/result), or
    /// `None` for an unknown UID. Lock-free read.
    pub async fn status(&self, uid: Uuid) -> Result<Option<serde_json::Value>, ServiceError> {
        Ok(self.store.get_document(uid).await?)
    }

    /// Typed read of a job record.
    pub async fn job(&self, uid: Uuid) -> Result<Option<Job<F::Request>>, ServiceError> {
        Ok(self.store.get(uid).await?)
    }

    /// Administrative resubmission: reset the record to `submitted` with
    /// prior outcome cleared, then re-queue under the same UID. Returns
    /// false when the UID is unknown.
    pub async fn resubmit(&self, uid: Uuid) -> Result<bool, ServiceError> {
        let guard = self.lock.acquire().await?;
        let outcome = self.store.reset_for_resubmission(uid).await;
        guard.release().await;

        if outcome? {
            self.enqueue(uid).await?;
            info!(family = self.family_name(), job_uid = %uid, "Job resubmitted");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
