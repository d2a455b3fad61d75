//! Infrastructure: storage-backed job store, locks, queue, subprocess
//! execution and the shared static-file builder.

pub mod executor;
pub mod job_store;
pub mod lock;
pub mod queue;
pub mod static_files;

pub use executor::{CommandExecutor, CommandOutput, CommandSpec, ExecutorError, ProcessExecutor};
pub use job_store::{canonical_digest, JobStore, JobStoreError};
pub use lock::{DistributedLock, LockError, LockGuard};
pub use queue::{spawn_job_worker_pool, JobQueueHandle, QueueError, QueuedJob};
pub use static_files::{StaticFileBuilder, StaticFileError, StaticResource};
