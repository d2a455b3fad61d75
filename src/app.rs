//! Application setup and wiring

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio_util::sync::CancellationToken;

use biograph_core::infrastructure::auth::ApiKeyRepository;
use biograph_core::infrastructure::storage::{RedisStorage, StorageBackend};
use biograph_core::Config;

use biograph_orchestrator::application::runner::RunnerRegistry;
use biograph_orchestrator::application::service::JobService;
use biograph_orchestrator::families::{
    self, bicon::BiconFamily, closeness::ClosenessFamily, diamond::DiamondFamily,
    domino::DominoFamily, graph::GraphFamily, kpm::KpmFamily, must::MustFamily,
    robust::RobustFamily, trustrank::TrustRankFamily, validation::ValidationFamily,
    RunnerContext,
};
use biograph_orchestrator::infrastructure::executor::ProcessExecutor;
use biograph_orchestrator::infrastructure::queue::{spawn_job_worker_pool, JobQueueHandle};
use biograph_orchestrator::infrastructure::static_files::StaticFileBuilder;
use biograph_orchestrator::presentation::middleware::AuthState;
use biograph_orchestrator::presentation::routes::create_router;
use biograph_orchestrator::presentation::ApiState;

/// Handle returned from create_app for graceful shutdown coordination
pub struct AppHandle {
    pub router: Router,
    pub shutdown_token: CancellationToken,
}

/// Wire up storage, the job services and the worker pool, and build the
/// application router.
pub async fn create_app(config: Config) -> anyhow::Result<AppHandle> {
    let backend: Arc<dyn StorageBackend> = Arc::new(
        RedisStorage::connect(&config.storage.redis_url)
            .await
            .context("failed to connect to the storage backend")?,
    );

    create_directories(&config).await?;

    let executor = Arc::new(ProcessExecutor::new());
    let static_files = Arc::new(StaticFileBuilder::new(
        backend.clone(),
        executor.clone(),
        config.directories.clone(),
        Duration::from_secs(config.jobs.lock_ttl_seconds),
        // Static builds are long; first users wait on this lock for the
        // build itself, not for a store lookup.
        Duration::from_secs(config.jobs.lock_ttl_seconds),
    ));
    let ctx = RunnerContext {
        executor,
        static_files,
        dirs: config.directories.clone(),
    };

    let queue = JobQueueHandle::new(backend.clone(), &config.jobs.queue_key);

    macro_rules! service {
        ($family:expr) => {
            Arc::new(JobService::new(
                Arc::new($family),
                backend.clone(),
                queue.clone(),
                ctx.clone(),
                &config.jobs,
            ))
        };
    }

    let diamond = service!(DiamondFamily);
    let must = service!(MustFamily);
    let domino = service!(DominoFamily);
    let kpm = service!(KpmFamily);
    let robust = service!(RobustFamily);
    let trustrank = service!(TrustRankFamily);
    let closeness = service!(ClosenessFamily);
    let validation = service!(ValidationFamily);
    let graphs = service!(GraphFamily);
    let bicon = service!(BiconFamily);

    let registry = Arc::new(
        RunnerRegistry::new()
            .with(diamond.clone())
            .with(must.clone())
            .with(domino.clone())
            .with(kpm.clone())
            .with(robust.clone())
            .with(trustrank.clone())
            .with(closeness.clone())
            .with(validation.clone())
            .with(graphs.clone())
            .with(bicon.clone()),
    );

    let shutdown_token = CancellationToken::new();
    spawn_job_worker_pool(
        registry,
        queue.clone(),
        config.jobs.max_concurrent_jobs,
        Duration::from_secs(config.jobs.queue_poll_seconds),
        shutdown_token.clone(),
    );

    let api_keys = Arc::new(ApiKeyRepository::new(backend.clone()));

    let state = ApiState {
        diamond,
        must,
        domino,
        kpm,
        robust,
        trustrank,
        closeness,
        validation,
        graphs,
        bicon,
        api_keys: api_keys.clone(),
        dirs: config.directories.clone(),
        graph_config: config.graph.clone(),
    };
    let auth = AuthState {
        api_keys,
        config: config.auth.clone(),
    };

    let router = create_router(state, auth, &config.server);

    Ok(AppHandle {
        router,
        shutdown_token,
    })
}

/// Ensure the per-family artifact directories and the static-file directory
/// exist before any job runs.
async fn create_directories(config: &Config) -> anyhow::Result<()> {
    for family in [
        families::bicon::NAME,
        families::closeness::NAME,
        families::diamond::NAME,
        families::domino::NAME,
        families::graph::NAME,
        families::kpm::NAME,
        families::must::NAME,
        families::robust::NAME,
        families::trustrank::NAME,
        families::validation::NAME,
    ] {
        tokio::fs::create_dir_all(config.directories.family_dir(family))
            .await
            .with_context(|| format!("failed to create data directory for {}", family))?;
    }
    tokio::fs::create_dir_all(&config.directories.static_files)
        .await
        .context("failed to create the static-file directory")?;
    Ok(())
}
