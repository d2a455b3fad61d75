//! Job records and the job state machine

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted and queued; the runner has not picked it up yet
    Submitted,
    /// The runner is executing the external computation
    Running,
    /// Finished successfully; results recorded
    Completed,
    /// Finished unsuccessfully; error recorded
    Failed,
}

impl JobStatus {
    /// Returns the set of valid target states from the current state.
    ///
    /// ```text
    /// Submitted ──► Running ──► Completed
    ///                  │
    ///                  └──► Failed
    /// ```
    ///
    /// Terminal states have no outgoing transitions here; administrative
    /// resubmission resets a record to `Submitted` outside the machine.
    pub fn valid_transitions(&self) -> &[JobStatus] {
        match self {
            Self::Submitted => &[Self::Running],
            Self::Running => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    /// Check whether transitioning to `target` is allowed from this state.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Whether this status represents a terminal (final) state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Error returned when an invalid status transition is attempted.
#[derive(Debug, thiserror::Error)]
#[error("Invalid job transition from {from} to {to}")]
pub struct JobTransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// A job record, parameterized over its family's canonical request type.
///
/// The canonical request is flattened into the stored document, so a status
/// query returns the request fields alongside the bookkeeping fields, and
/// two jobs of one family are duplicates exactly when their canonical
/// requests serialize identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job<R> {
    pub uid: Uuid,
    pub status: JobStatus,
    #[serde(flatten)]
    pub request: R,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Present only when `status` is `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present only when `status` is `completed` and the family produces an
    /// inline payload (artifact-only families leave this unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl<R> Job<R>
where
    R: Serialize + DeserializeOwned,
{
    /// A fresh record in the `submitted` state.
    pub fn new(uid: Uuid, request: R) -> Self {
        Self {
            uid,
            status: JobStatus::Submitted,
            request,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
            result: None,
        }
    }

    /// Validate and apply a status transition.
    pub fn transition(&mut self, to: JobStatus) -> Result<(), JobTransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(JobTransitionError {
                from: self.status,
                to,
            });
        }
        match to {
            JobStatus::Running => self.started_at = Some(Utc::now()),
            JobStatus::Completed | JobStatus::Failed => self.finished_at = Some(Utc::now()),
            JobStatus::Submitted => {}
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Params {
        seeds: Vec<String>,
    }

    fn job() -> Job<Params> {
        Job::new(
            Uuid::new_v4(),
            Params {
                seeds: vec!["P12345".to_string()],
            },
        )
    }

    #[test]
    fn lifecycle_follows_the_state_machine() {
        let mut job = job();
        assert_eq!(job.status, JobStatus::Submitted);

        job.transition(JobStatus::Running).unwrap();
        assert!(job.started_at.is_some());

        job.transition(JobStatus::Completed).unwrap();
        assert!(job.finished_at.is_some());
        assert!(job.status.is_terminal());
    }

    #[test]
    fn running_cannot_be_skipped() {
        let mut job = job();
        let err = job.transition(JobStatus::Completed).unwrap_err();
        assert_eq!(err.from, JobStatus::Submitted);
        assert_eq!(err.to, JobStatus::Completed);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut job = job();
        job.transition(JobStatus::Running).unwrap();
        job.transition(JobStatus::Failed).unwrap();
        assert!(job.transition(JobStatus::Running).is_err());
    }

    #[test]
    fn request_fields_flatten_into_the_document() {
        let job = job();
        let doc = serde_json::to_value(&job).unwrap();
        assert_eq!(doc["status"], "submitted");
        assert_eq!(doc["seeds"][0], "P12345");
        assert!(doc.get("error").is_none());
        assert!(doc.get("result").is_none());
    }
}
