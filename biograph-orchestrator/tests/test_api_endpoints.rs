//! HTTP-level tests for the route layer against the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use biograph_core::config::{AuthConfig, DirectoriesConfig, GraphConfig, JobsConfig, ServerConfig};
use biograph_core::infrastructure::auth::ApiKeyRepository;
use biograph_core::infrastructure::storage::{MemoryStorage, StorageBackend};

use biograph_orchestrator::application::service::JobService;
use biograph_orchestrator::families::{
    bicon::BiconFamily, closeness::ClosenessFamily, diamond::DiamondFamily,
    domino::DominoFamily, graph::GraphFamily, kpm::KpmFamily, must::MustFamily,
    robust::RobustFamily, trustrank::TrustRankFamily, validation::ValidationFamily,
    JobFamily, RunnerContext,
};
use biograph_orchestrator::infrastructure::executor::ProcessExecutor;
use biograph_orchestrator::infrastructure::queue::JobQueueHandle;
use biograph_orchestrator::infrastructure::static_files::StaticFileBuilder;
use biograph_orchestrator::presentation::middleware::AuthState;
use biograph_orchestrator::presentation::routes::create_router;
use biograph_orchestrator::presentation::ApiState;

fn test_router(require_api_keys: bool) -> (Router, Arc<ApiKeyRepository>) {
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
    let ctx = RunnerContext {
        executor,
        static_files,
        dirs: dirs.clone(),
    };
    let queue = JobQueueHandle::new(backend.clone(), &jobs.queue_key);

    fn service<F: JobFamily>(
        family: F,
        backend: &Arc<dyn StorageBackend>,
        queue: &JobQueueHandle,
        ctx: &RunnerContext,
        jobs: &JobsConfig,
    ) -> Arc<JobService<F>> {
        Arc::new(JobService::new(
            Arc::new(family),
            backend.clone(),
            queue.clone(),
            ctx.clone(),
            jobs,
        ))
    }

    let api_keys = Arc::new(ApiKeyRepository::new(backend.clone()));
    let state = ApiState {
        diamond: service(DiamondFamily, &backend, &queue, &ctx, &jobs),
        must: service(MustFamily, &backend, &queue, &ctx, &jobs),
        domino: service(DominoFamily, &backend, &queue, &ctx, &jobs),
        kpm: service(KpmFamily, &backend, &queue, &ctx, &jobs),
        robust: service(RobustFamily, &backend, &queue, &ctx, &jobs),
        trustrank: service(TrustRankFamily, &backend, &queue, &ctx, &jobs),
        closeness: service(ClosenessFamily, &backend, &queue, &ctx, &jobs),
        validation: service(ValidationFamily, &backend, &queue, &ctx, &jobs),
        graphs: service(GraphFamily, &backend, &queue, &ctx, &jobs),
        bicon: service(BiconFamily, &backend, &queue, &ctx, &jobs),
        api_keys: api_keys.clone(),
        dirs,
        graph_config: GraphConfig::default(),
    };
    let auth = AuthState {
        api_keys: api_keys.clone(),
        config: AuthConfig { require_api_keys },
    };
    let server = ServerConfig {
        enable_docs: false,
        ..Default::default()
    };

    (create_router(state, auth, &server), api_keys)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn submit_then_status_roundtrip() {
    let (router, _) = test_router(false);

    let response = router
        .clone()
        .oneshot(post_json(
            "/diamond/submit",
            serde_json::json!({ "seeds": ["673", "2717"], "n": 5 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let uid = body_json(response).await;
    let uid = uid.as_str().unwrap();

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/diamond/status?uid={}", uid))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let document = body_json(response).await;
    assert_eq!(document["status"], "submitted");
    assert_eq!(document["n"], 5);
    assert_eq!(document["seeds"][0], "2717");
}

#[tokio::test]
async fn duplicate_submissions_share_a_uid() {
    let (router, _) = test_router(false);

    let first = body_json(
        router
            .clone()
            .oneshot(post_json(
                "/trustrank/submit",
                serde_json::json!({ "seeds": ["uniprot.P12345", "Q67890"] }),
            ))
            .await
            .unwrap(),
    )
    .await;
    let second = body_json(
        router
            .oneshot(post_json(
                "/trustrank/submit",
                serde_json::json!({ "seeds": ["Q67890", "P12345"], "damping_factor": 0.85 }),
            ))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn missing_seeds_is_a_bad_request() {
    let (router, _) = test_router(false);
    let response = router
        .oneshot(post_json("/diamond/submit", serde_json::json!({ "n": 5 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let document = body_json(response).await;
    assert!(document["detail"].as_str().unwrap().contains("seeds"));
}

#[tokio::test]
async fn unknown_uid_status_is_an_empty_mapping() {
    let (router, _) = test_router(false);
    let response = router
        .oneshot(
            Request::builder()
                .uri("/must/status?uid=00000000-0000-0000-0000-000000000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({}));
}

#[tokio::test]
async fn download_requires_a_completed_job() {
    let (router, _) = test_router(false);
    let response = router
        .oneshot(
            Request::builder()
                .uri("/diamond/download?uid=00000000-0000-0000-0000-000000000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn graph_builder_rejects_unknown_collections() {
    let (router, _) = test_router(false);
    let response = router
        .oneshot(post_json(
            "/graph/builder",
            serde_json::json!({ "nodes": ["tissue"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn closed_deployments_require_an_api_key() {
    let (router, api_keys) = test_router(true);

    // Health stays open
    let response = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Keyless job routes are rejected
    let response = router
        .clone()
        .oneshot(post_json(
            "/diamond/submit",
            serde_json::json!({ "seeds": ["2717"], "n": 5 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A generated key opens them
    let key = api_keys.generate().await.unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/diamond/submit")
        .header("content-type", "application/json")
        .header("x-api-key", key)
        .body(Body::from(
            serde_json::json!({ "seeds": ["2717"], "n": 5 }).to_string(),
        ))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_resubmit_rejects_unknown_families() {
    let (router, _) = test_router(false);
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/resubmit/nonsense/00000000-0000-0000-0000-000000000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
