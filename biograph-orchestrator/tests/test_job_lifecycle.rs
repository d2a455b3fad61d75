//! Integration tests for the job lifecycle: idempotent submission, the
//! state machine under success and failure, and administrative
//! resubmission. Everything runs against the in-memory storage backend
//! with a scripted family instead of real algorithm executables.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use biograph_core::config::{DirectoriesConfig, JobsConfig};
use biograph_core::infrastructure::storage::{MemoryStorage, StorageBackend};

use biograph_orchestrator::application::runner::{FamilyRunner, RunnerRegistry};
use biograph_orchestrator::application::service::JobService;
use biograph_orchestrator::families::{
    diamond::{self, DiamondFamily, DiamondRequest},
    ExecutionError, JobFamily, RunnerContext,
};
use biograph_orchestrator::infrastructure::executor::ProcessExecutor;
use biograph_orchestrator::infrastructure::queue::{spawn_job_worker_pool, JobQueueHandle};
use biograph_orchestrator::infrastructure::static_files::StaticFileBuilder;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct EchoRequest {
    seeds: Vec<String>,
}

/// Scripted family: succeeds or fails on demand and counts executions.
struct EchoFamily {
    runs: AtomicUsize,
    fail: AtomicBool,
}

impl EchoFamily {
    fn new() -> Self {
        Self {
            runs: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl JobFamily for EchoFamily {
    type Request = EchoRequest;

    fn name(&self) -> &'static str {
        "echo"
    }

    async fn execute(
        &self,
        _job: &biograph_orchestrator::domain::job::Job<EchoRequest>,
        _ctx: &RunnerContext,
    ) -> Result<Option<serde_json::Value>, ExecutionError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExecutionError::NonZeroExit {
                tool: "echo",
                code: 1,
            });
        }
        Ok(Some(serde_json::json!({ "echoed": true })))
    }
}

struct Harness {
    backend: Arc<dyn StorageBackend>,
    queue: JobQueueHandle,
    ctx: RunnerContext,
    jobs: JobsConfig,
}

impl Harness {
    fn new() -> Self {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
        let jobs = JobsConfig::default();
        let dirs = DirectoriesConfig::default();
        let executor = Arc::new(ProcessExecutor::new());
        let static_files = Arc::new(StaticFileBuilder::new(
            backend.clone(),
            executor.clone(),
            dirs.clone(),
            Duration::from_secs(60),
            Duration::from_secs(1),
        ));
        let queue = JobQueueHandle::new(backend.clone(), &jobs.queue_key);
        let ctx = RunnerContext {
            executor,
            static_files,
            dirs,
        };
        Self {
            backend,
            queue,
            ctx,
            jobs,
        }
    }

    fn service<F: JobFamily>(&self, family: Arc<F>) -> Arc<JobService<F>> {
        Arc::new(JobService::new(
            family,
            self.backend.clone(),
            self.queue.clone(),
            self.ctx.clone(),
            &self.jobs,
        ))
    }
}

fn echo_request() -> EchoRequest {
    EchoRequest {
        seeds: vec!["2717".to_string(), "673".to_string()],
    }
}

async fn status_of(
    service: &JobService<EchoFamily>,
    uid: Uuid,
) -> (String, Option<String>, Option<serde_json::Value>) {
    let doc = service.status(uid).await.unwrap().unwrap();
    (
        doc["status"].as_str().unwrap().to_string(),
        doc.get("error").and_then(|e| e.as_str()).map(String::from),
        doc.get("result").cloned(),
    )
}

#[tokio::test]
async fn submission_is_idempotent_and_runs_at_most_once() {
    let harness = Harness::new();
    let family = Arc::new(EchoFamily::new());
    let service = harness.service(family.clone());

    let first = service.submit(echo_request()).await.unwrap();
    let second = service.submit(echo_request()).await.unwrap();
    assert_eq!(first, second);

    service.run(first).await;
    // The duplicate submission queued nothing, so one execution total
    assert_eq!(family.runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reordered_seed_lists_return_the_same_uid() {
    let harness = Harness::new();
    let service = harness.service(Arc::new(DiamondFamily));

    let forward = diamond::normalize(DiamondRequest {
        seeds: Some(vec!["2717".to_string(), "673".to_string()]),
        n: Some(5),
        ..Default::default()
    })
    .unwrap();
    let backward = diamond::normalize(DiamondRequest {
        seeds: Some(vec!["673".to_string(), "2717".to_string()]),
        n: Some(5),
        ..Default::default()
    })
    .unwrap();

    let first = service.submit(forward).await.unwrap();
    let second = service.submit(backward).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn successful_jobs_complete_with_a_result() {
    let harness = Harness::new();
    let family = Arc::new(EchoFamily::new());
    let service = harness.service(family);

    let uid = service.submit(echo_request()).await.unwrap();
    service.run(uid).await;

    let (status, error, result) = status_of(&service, uid).await;
    assert_eq!(status, "completed");
    assert_eq!(error, None);
    assert_eq!(result.unwrap()["echoed"], true);

    // Status reads are stable
    let again = status_of(&service, uid).await;
    assert_eq!(again.0, "completed");
}

#[tokio::test]
async fn failed_executions_never_leave_a_job_running() {
    let harness = Harness::new();
    let family = Arc::new(EchoFamily::new());
    family.fail.store(true, Ordering::SeqCst);
    let service = harness.service(family.clone());

    let uid = service.submit(echo_request()).await.unwrap();
    service.run(uid).await;

    let (status, error, result) = status_of(&service, uid).await;
    assert_eq!(status, "failed");
    let error = error.unwrap();
    assert!(!error.is_empty());
    assert!(error.contains("return code 1"));
    assert!(result.is_none());
}

#[tokio::test]
async fn resubmission_reuses_the_uid_and_clears_the_old_outcome() {
    let harness = Harness::new();
    let family = Arc::new(EchoFamily::new());
    family.fail.store(true, Ordering::SeqCst);
    let service = harness.service(family.clone());

    let uid = service.submit(echo_request()).await.unwrap();
    service.run(uid).await;
    assert_eq!(status_of(&service, uid).await.0, "failed");

    // Fix the "environment" and resubmit
    family.fail.store(false, Ordering::SeqCst);
    assert!(service.resubmit(uid).await.unwrap());

    let (status, error, _) = status_of(&service, uid).await;
    assert_eq!(status, "submitted");
    assert_eq!(error, None);

    service.run(uid).await;
    let (status, _, result) = status_of(&service, uid).await;
    assert_eq!(status, "completed");
    assert!(result.is_some());

    // Same canonical request still resolves to the same record
    assert_eq!(service.submit(echo_request()).await.unwrap(), uid);
}

#[tokio::test]
async fn resubmitting_an_unknown_uid_reports_missing() {
    let harness = Harness::new();
    let service = harness.service(Arc::new(EchoFamily::new()));
    assert!(!service.resubmit(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn worker_pool_drains_the_queue_to_a_terminal_state() {
    let harness = Harness::new();
    let family = Arc::new(EchoFamily::new());
    let service = harness.service(family.clone());

    let registry = Arc::new(RunnerRegistry::new().with(service.clone()));
    let shutdown = CancellationToken::new();
    spawn_job_worker_pool(
        registry,
        harness.queue.clone(),
        2,
        Duration::from_millis(50),
        shutdown.clone(),
    );

    let uid = service.submit(echo_request()).await.unwrap();

    let mut status = String::new();
    for _ in 0..100 {
        status = status_of(&service, uid).await.0;
        if status == "completed" || status == "failed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    shutdown.cancel();

    assert_eq!(status, "completed");
    assert_eq!(family.runs.load(Ordering::SeqCst), 1);

    // The recorded sequence never skipped running: started_at is stamped
    let doc = service.status(uid).await.unwrap().unwrap();
    assert!(doc.get("started_at").is_some());
    assert!(doc.get("finished_at").is_some());
}
