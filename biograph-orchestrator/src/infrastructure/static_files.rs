//! Shared static-file builder
//!
//! Several families consume expensive derived files: the input networks for
//! the module-detection algorithms, the merged protein-protein-drug ranking
//! network, and the validation networks. Each is built at most once by an
//! external script and then reused by every subsequent job, across all
//! worker processes.
//!
//! `ensure_built` uses a double-checked flag: a persisted built-flag is read
//! first, the dedicated build lock is taken only on a miss, and the flag is
//! re-checked under the lock before the build subprocess runs. The flag is
//! set only on a successful build, so a failed build is retried by the next
//! caller.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use biograph_core::config::DirectoriesConfig;
use biograph_core::infrastructure::storage::{StorageBackend, StorageError};

use super::executor::{CommandExecutor, CommandSpec, ExecutorError};
use super::lock::{DistributedLock, LockError};

pub const STATIC_LOCK_KEY: &str = "lock:static-files";

/// The derived files shared across job families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticResource {
    /// Gene-gene network from experimentally-asserted PPIs (TSV edge list)
    GgiDefault,
    /// Gene-gene network from shared disorder associations (TSV edge list)
    GgiSharedDisorder,
    /// Protein-protein network from experimentally-asserted PPIs (TSV edge list)
    PpiDefault,
    /// SIF renditions of the above, for algorithms that consume SIF
    GgiDefaultSif,
    GgiSharedDisorderSif,
    PpiDefaultSif,
    /// The merged protein-protein-drug network used by the ranking families
    RankingNetwork,
    /// The networks consumed by the validation scripts
    ValidationNetworks,
}

impl StaticResource {
    /// Stable identifier used in flag keys.
    pub fn key(&self) -> &'static str {
        match self {
            Self::GgiDefault => "network-ggi-default",
            Self::GgiSharedDisorder => "network-ggi-shared-disorder",
            Self::PpiDefault => "network-ppi-default",
            Self::GgiDefaultSif => "network-ggi-default-sif",
            Self::GgiSharedDisorderSif => "network-ggi-shared-disorder-sif",
            Self::PpiDefaultSif => "network-ppi-default-sif",
            Self::RankingNetwork => "ranking-network",
            Self::ValidationNetworks => "validation-networks",
        }
    }

    /// The primary artifact the resource produces.
    pub fn artifact(&self, dirs: &DirectoriesConfig) -> PathBuf {
        let name = match self {
            Self::GgiDefault => "ggi-default.tsv",
            Self::GgiSharedDisorder => "ggi-shared-disorder.tsv",
            Self::PpiDefault => "ppi-default.tsv",
            Self::GgiDefaultSif => "ggi-default.sif",
            Self::GgiSharedDisorderSif => "ggi-shared-disorder.sif",
            Self::PpiDefaultSif => "ppi-default.sif",
            Self::RankingNetwork => "PPDr-for-ranking.graphml",
            Self::ValidationNetworks => "GGI.gt",
        };
        dirs.static_files.join(name)
    }

    fn command(&self, dirs: &DirectoriesConfig) -> CommandSpec {
        let export = |source: &str, format: &str| {
            CommandSpec::new(dirs.scripts.join("export_network.py"))
                .arg("--source")
                .arg(source)
                .arg("--format")
                .arg(format)
                .arg("--outfile")
                .arg(self.artifact(dirs).display().to_string())
        };

        match self {
            Self::GgiDefault => export("ggi", "tsv"),
            Self::GgiSharedDisorder => export("ggi-shared-disorder", "tsv"),
            Self::PpiDefault => export("ppi", "tsv"),
            Self::GgiDefaultSif => export("ggi", "sif"),
            Self::GgiSharedDisorderSif => export("ggi-shared-disorder", "sif"),
            Self::PpiDefaultSif => export("ppi", "sif"),
            Self::RankingNetwork => {
                CommandSpec::new(dirs.scripts.join("generate_ranking_input_networks.py"))
                    .current_dir(&dirs.static_files)
            }
            Self::ValidationNetworks => CommandSpec::new("python")
                .arg(
                    dirs.scripts
                        .join("validation/network_generator.py")
                        .display()
                        .to_string(),
                )
                .current_dir(&dirs.static_files),
        }
    }
}

/// Static-file build errors
#[derive(Debug, thiserror::Error)]
pub enum StaticFileError {
    #[error("Static build for {resource} exited with return code {code:?}")]
    BuildFailed {
        resource: &'static str,
        code: Option<i32>,
    },

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Builds shared static files at most once.
#[derive(Clone)]
pub struct StaticFileBuilder {
    backend: Arc<dyn StorageBackend>,
    executor: Arc<dyn CommandExecutor>,
    lock: DistributedLock,
    dirs: DirectoriesConfig,
}

impl StaticFileBuilder {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        executor: Arc<dyn CommandExecutor>,
        dirs: DirectoriesConfig,
        lock_ttl: Duration,
        lock_acquire_timeout: Duration,
    ) -> Self {
        let lock = DistributedLock::new(
            backend.clone(),
            STATIC_LOCK_KEY,
            lock_ttl,
            lock_acquire_timeout,
        );
        Self {
            backend,
            executor,
            lock,
            dirs,
        }
    }

    pub fn dirs(&self) -> &DirectoriesConfig {
        &self.dirs
    }

    fn flag_key(resource: StaticResource) -> String {
        format!("static:{}:built", resource.key())
    }

    async fn is_built(&self, resource: StaticResource) -> Result<bool, StaticFileError> {
        Ok(self
            .backend
            .get(&Self::flag_key(resource))
            .await?
            .as_deref()
            == Some("true"))
    }

    /// Return the artifact path, building the resource first if no prior
    /// successful build is recorded.
    pub async fn ensure_built(
        &self,
        resource: StaticResource,
    ) -> Result<PathBuf, StaticFileError> {
        if self.is_built(resource).await? {
            return Ok(resource.artifact(&self.dirs));
        }

        let guard = self.lock.acquire().await?;
        let outcome = self.build_locked(resource).await;
        guard.release().await;
        outcome?;

        Ok(resource.artifact(&self.dirs))
    }

    async fn build_locked(&self, resource: StaticResource) -> Result<(), StaticFileError> {
        // Another worker may have finished the build while we waited.
        if self.is_built(resource).await? {
            return Ok(());
        }

        info!(resource = resource.key(), "Building static resource");
        let output = self.executor.run(&resource.command(&self.dirs)).await?;
        if !output.success() {
            warn!(
                resource = resource.key(),
                code = ?output.status_code,
                stderr = %output.stderr,
                "Static resource build failed"
            );
            return Err(StaticFileError::BuildFailed {
                resource: resource.key(),
                code: output.status_code,
            });
        }

        self.backend.set(&Self::flag_key(resource), "true").await?;
        info!(resource = resource.key(), "Static resource built");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use biograph_core::infrastructure::storage::MemoryStorage;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

    use super::super::executor::CommandOutput;

    struct CountingExecutor {
        invocations: AtomicUsize,
        exit_code: AtomicI32,
    }

    impl CountingExecutor {
        fn with_exit_code(code: i32) -> Self {
            Self {
                invocations: AtomicUsize::new(0),
                exit_code: AtomicI32::new(code),
            }
        }
    }

    #[async_trait]
    impl CommandExecutor for CountingExecutor {
        async fn run(&self, _spec: &CommandSpec) -> Result<CommandOutput, ExecutorError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(CommandOutput {
                status_code: Some(self.exit_code.load(Ordering::SeqCst)),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn builder(executor: Arc<CountingExecutor>) -> StaticFileBuilder {
        StaticFileBuilder::new(
            Arc::new(MemoryStorage::new()),
            executor,
            DirectoriesConfig::default(),
            Duration::from_secs(60),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn builds_only_once() {
        let executor = Arc::new(CountingExecutor::with_exit_code(0));
        let builder = builder(executor.clone());

        builder.ensure_built(StaticResource::RankingNetwork).await.unwrap();
        builder.ensure_built(StaticResource::RankingNetwork).await.unwrap();

        assert_eq!(executor.invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_first_use_builds_once() {
        let executor = Arc::new(CountingExecutor::with_exit_code(0));
        let builder = builder(executor.clone());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let builder = builder.clone();
                tokio::spawn(async move {
                    builder.ensure_built(StaticResource::RankingNetwork).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(executor.invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_builds_are_retried() {
        let executor = Arc::new(CountingExecutor::with_exit_code(2));
        let builder = builder(executor.clone());

        let err = builder
            .ensure_built(StaticResource::RankingNetwork)
            .await
            .unwrap_err();
        assert!(matches!(err, StaticFileError::BuildFailed { .. }));

        // A later call retries now that the flag was never set
        executor.exit_code.store(0, Ordering::SeqCst);
        builder.ensure_built(StaticResource::RankingNetwork).await.unwrap();
        assert_eq!(executor.invocations.load(Ordering::SeqCst), 2);
    }
}
