//! Runner harness
//!
//! The worker pool hands a runner nothing but a UID; everything else is
//! re-read from the store so execution always follows what was persisted,
//! not what some request handler had in memory. The harness drives the
//! state machine and is the single place where asynchronous failures are
//! converted into `failed` records - no error may escape it and leave a job
//! stuck in `running`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::service::{JobService, ServiceError};
use crate::domain::job::Job;
use crate::families::JobFamily;

/// Object-safe runner interface dispatched by the worker pool.
#[async_trait]
pub trait FamilyRunner: Send + Sync {
    fn family(&self) -> &'static str;

    /// Drive the job with this UID to a terminal state. Infallible by
    /// contract: failures are recorded on the job, not propagated.
    async fn run(&self, uid: Uuid);
}

/// Maps queue message family tags to their runners.
#[derive(Default)]
pub struct RunnerRegistry {
    runners: HashMap<&'static str, Arc<dyn FamilyRunner>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, runner: Arc<dyn FamilyRunner>) -> Self {
        self.runners.insert(runner.family(), runner);
        self
    }

    pub fn get(&self, family: &str) -> Option<Arc<dyn FamilyRunner>> {
        self.runners.get(family).cloned()
    }
}

impl<F: JobFamily> JobService<F> {
    /// Re-fetch the job under the family lock and flip it to `running`.
    /// `Ok(None)` means the UID is unknown (queue message outlived the
    /// record).
    async fn begin(&self, uid: Uuid) -> Result<Option<Job<F::Request>>, ServiceError> {
        let guard = self.lock().acquire().await?;

        let fetched = self.store().get::<F::Request>(uid).await;
        let job = match fetched {
            Ok(Some(job)) => job,
            Ok(None) => {
                guard.release().await;
                return Ok(None);
            }
            Err(e) => {
                guard.release().await;
                return Err(e.into());
            }
        };

        let marked = self.store().mark_running(uid).await;
        guard.release().await;
        marked?;

        Ok(Some(job))
    }

    async fn complete(
        &self,
        uid: Uuid,
        result: Option<serde_json::Value>,
    ) -> Result<(), ServiceError> {
        let guard = self.lock().acquire().await?;
        let outcome = self.store().mark_completed(uid, result).await;
        guard.release().await;
        Ok(outcome?)
    }

    async fn fail(&self, uid: Uuid, message: &str) -> Result<(), ServiceError> {
        let guard = self.lock().acquire().await?;
        let outcome = self.store().mark_failed(uid, message).await;
        guard.release().await;
        Ok(outcome?)
    }
}

#[async_trait]
impl<F: JobFamily> FamilyRunner for JobService<F> {
    fn family(&self) -> &'static str {
        self.family_name()
    }

    async fn run(&self, uid: Uuid) {
        let job = match self.begin(uid).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(family = self.family_name(), job_uid = %uid, "Queued job has no stored record; dropping");
                return;
            }
            Err(e) => {
                error!(family = self.family_name(), job_uid = %uid, error = %e, "Failed to start job");
                return;
            }
        };

        info!(family = self.family_name(), job_uid = %uid, "Starting job");

        match self.family().execute(&job, self.ctx()).await {
            Ok(result) => {
                if let Err(e) = self.complete(uid, result).await {
                    error!(family = self.family_name(), job_uid = %uid, error = %e, "Failed to record job completion");
                } else {
                    info!(family = self.family_name(), job_uid = %uid, "Finished job");
                }
            }
            Err(e) => {
                warn!(family = self.family_name(), job_uid = %uid, error = %e, "Job execution failed");
                if let Err(e2) = self.fail(uid, &e.to_string()).await {
                    error!(family = self.family_name(), job_uid = %uid, error = %e2, "Failed to record job failure");
                }
            }
        }
    }
}
