//! Job persistence and deduplication
//!
//! One [`JobStore`] per job family, namespaced by family name. Records are
//! stored as JSON documents keyed by UID, with a secondary index from the
//! canonical-request digest to the UID enforcing the deduplication
//! invariant: at most one job per distinct canonical request per family.
//!
//! `find_or_create` and the status writers must be called under the
//! family's [`DistributedLock`](super::lock::DistributedLock); `get` is a
//! lock-free read.

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use biograph_core::infrastructure::storage::{StorageBackend, StorageError};

use crate::domain::job::{Job, JobStatus, JobTransitionError};

/// Job persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    InvalidTransition(#[from] JobTransitionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for JobStoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Hex SHA-256 of a canonical request's JSON document.
///
/// Canonical requests are structs with a fixed field order whose lists are
/// pre-sorted and whose defaults are pre-applied, so semantically equal
/// requests serialize byte-identically and digest identically.
pub fn canonical_digest<R: Serialize>(request: &R) -> Result<String, JobStoreError> {
    let bytes = serde_json::to_vec(request)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Per-family job store over the shared storage backend.
#[derive(Clone)]
pub struct JobStore {
    backend: Arc<dyn StorageBackend>,
    family: &'static str,
}

impl JobStore {
    pub fn new(backend: Arc<dyn StorageBackend>, family: &'static str) -> Self {
        Self { backend, family }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    fn record_key(&self, uid: Uuid) -> String {
        format!("jobs:{}:{}", self.family, uid)
    }

    fn index_key(&self, digest: &str) -> String {
        format!("jobs:{}:request:{}", self.family, digest)
    }

    /// Find an existing job with an equal canonical request, or insert a new
    /// `submitted` record. Returns the UID and whether a record was created.
    ///
    /// Must be called under the family lock: the lookup and the insert are
    /// two storage operations.
    pub async fn find_or_create<R>(&self, request: &R) -> Result<(Uuid, bool), JobStoreError>
    where
        R: Serialize + DeserializeOwned + Clone,
    {
        let digest = canonical_digest(request)?;
        let index_key = self.index_key(&digest);

        if let Some(existing) = self.backend.get(&index_key).await? {
            if let Ok(uid) = existing.parse::<Uuid>() {
                return Ok((uid, false));
            }
        }

        let uid = Uuid::new_v4();
        let job = Job::new(uid, request.clone());
        self.backend
            .set(&self.record_key(uid), &serde_json::to_string(&job)?)
            .await?;
        self.backend.set(&index_key, &uid.to_string()).await?;

        info!(family = self.family, job_uid = %uid, "Created job record");
        Ok((uid, true))
    }

    /// Typed read of a job record.
    pub async fn get<R>(&self, uid: Uuid) -> Result<Option<Job<R>>, JobStoreError>
    where
        R: DeserializeOwned,
    {
        match self.backend.get(&self.record_key(uid)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Untyped read of the stored document, as served by the status route.
    pub async fn get_document(&self, uid: Uuid) -> Result<Option<serde_json::Value>, JobStoreError> {
        match self.backend.get(&self.record_key(uid)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Transition `submitted -> running`. Must be called under the family
    /// lock by the family's runner.
    pub async fn mark_running(&self, uid: Uuid) -> Result<(), JobStoreError> {
        self.update_status(uid, JobStatus::Running, |doc| {
            doc["started_at"] = serde_json::json!(Utc::now());
        })
        .await
    }

    /// Transition `running -> completed`, recording the result payload when
    /// the family produces one. Must be called under the family lock.
    pub async fn mark_completed(
        &self,
        uid: Uuid,
        result: Option<serde_json::Value>,
    ) -> Result<(), JobStoreError> {
        self.update_status(uid, JobStatus::Completed, |doc| {
            doc["finished_at"] = serde_json::json!(Utc::now());
            if let Some(result) = result {
                doc["result"] = result;
            }
        })
        .await
    }

    /// Transition `running -> failed` with a diagnostic. Must be called
    /// under the family lock.
    pub async fn mark_failed(&self, uid: Uuid, error: &str) -> Result<(), JobStoreError> {
        self.update_status(uid, JobStatus::Failed, |doc| {
            doc["finished_at"] = serde_json::json!(Utc::now());
            doc["error"] = serde_json::json!(error);
        })
        .await
    }

    /// Administrative reset: back to `submitted` with prior outcome fields
    /// cleared, preserving the UID and canonical request. Returns false when
    /// no such job exists. Must be called under the family lock.
    pub async fn reset_for_resubmission(&self, uid: Uuid) -> Result<bool, JobStoreError> {
        let key = self.record_key(uid);
        let Some(raw) = self.backend.get(&key).await? else {
            return Ok(false);
        };
        let mut doc: serde_json::Value = serde_json::from_str(&raw)?;

        doc["status"] = serde_json::json!(JobStatus::Submitted);
        if let Some(fields) = doc.as_object_mut() {
            // Stale outcome data must not be visible while the rerun is in
            // flight.
            fields.remove("error");
            fields.remove("result");
            fields.remove("started_at");
            fields.remove("finished_at");
        }

        self.backend.set(&key, &serde_json::to_string(&doc)?).await?;
        info!(family = self.family, job_uid = %uid, "Reset job for resubmission");
        Ok(true)
    }

    async fn update_status(
        &self,
        uid: Uuid,
        to: JobStatus,
        apply: impl FnOnce(&mut serde_json::Value),
    ) -> Result<(), JobStoreError> {
        let key = self.record_key(uid);
        let raw = self
            .backend
            .get(&key)
            .await?
            .ok_or(JobStoreError::NotFound(uid))?;
        let mut doc: serde_json::Value = serde_json::from_str(&raw)?;

        let from: JobStatus = serde_json::from_value(doc["status"].clone())?;
        if !from.can_transition_to(to) {
            return Err(JobTransitionError { from, to }.into());
        }

        doc["status"] = serde_json::json!(to);
        apply(&mut doc);

        self.backend.set(&key, &serde_json::to_string(&doc)?).await?;
        info!(family = self.family, job_uid = %uid, status = %to, "Job status updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biograph_core::infrastructure::storage::MemoryStorage;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Params {
        seeds: Vec<String>,
        n: u32,
    }

    fn store() -> JobStore {
        JobStore::new(Arc::new(MemoryStorage::new()), "diamond")
    }

    fn params() -> Params {
        Params {
            seeds: vec!["2717".to_string(), "673".to_string()],
            n: 10,
        }
    }

    #[tokio::test]
    async fn find_or_create_deduplicates() {
        let store = store();

        let (uid, created) = store.find_or_create(&params()).await.unwrap();
        assert!(created);

        let (again, created) = store.find_or_create(&params()).await.unwrap();
        assert!(!created);
        assert_eq!(uid, again);
    }

    #[tokio::test]
    async fn different_requests_get_different_jobs() {
        let store = store();
        let (a, _) = store.find_or_create(&params()).await.unwrap();
        let (b, _) = store
            .find_or_create(&Params {
                n: 25,
                ..params()
            })
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn status_transitions_are_validated() {
        let store = store();
        let (uid, _) = store.find_or_create(&params()).await.unwrap();

        // completed before running is rejected
        let err = store.mark_completed(uid, None).await.unwrap_err();
        assert!(matches!(err, JobStoreError::InvalidTransition(_)));

        store.mark_running(uid).await.unwrap();
        store
            .mark_completed(uid, Some(serde_json::json!({"nodes": []})))
            .await
            .unwrap();

        let job: Job<Params> = store.get(uid).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.result.is_some());
        assert!(job.started_at.is_some());
        assert!(job.finished_at.is_some());
    }

    #[tokio::test]
    async fn mark_failed_records_the_diagnostic() {
        let store = store();
        let (uid, _) = store.find_or_create(&params()).await.unwrap();
        store.mark_running(uid).await.unwrap();
        store.mark_failed(uid, "exited with return code 1").await.unwrap();

        let job: Job<Params> = store.get(uid).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("exited with return code 1"));
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn reset_clears_outcome_and_keeps_uid() {
        let store = store();
        let (uid, _) = store.find_or_create(&params()).await.unwrap();
        store.mark_running(uid).await.unwrap();
        store.mark_failed(uid, "boom").await.unwrap();

        assert!(store.reset_for_resubmission(uid).await.unwrap());

        let job: Job<Params> = store.get(uid).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Submitted);
        assert!(job.error.is_none());
        assert!(job.started_at.is_none());

        // The canonical request still maps to the same UID
        let (again, created) = store.find_or_create(&params()).await.unwrap();
        assert!(!created);
        assert_eq!(uid, again);
    }

    #[tokio::test]
    async fn reset_of_unknown_uid_reports_missing() {
        let store = store();
        assert!(!store.reset_for_resubmission(Uuid::new_v4()).await.unwrap());
    }

    #[test]
    fn digest_is_field_order_stable() {
        let a = canonical_digest(&params()).unwrap();
        let b = canonical_digest(&params()).unwrap();
        assert_eq!(a, b);
    }
}
