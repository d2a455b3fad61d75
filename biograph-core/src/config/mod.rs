//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub directories: DirectoriesConfig,
    pub jobs: JobsConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub graph: GraphConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            directories: DirectoriesConfig::default(),
            jobs: JobsConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
            graph: GraphConfig::default(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Whether to mount the Swagger UI and OpenAPI document
    pub enable_docs: bool,
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_docs: true,
            request_timeout_seconds: 30,
        }
    }
}

/// Storage backend configuration
///
/// The same Redis instance backs job records, the deduplication index,
/// distributed locks, the job queue and static-file flags. Worker processes
/// on different hosts must point at the same instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub redis_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/1".to_string(),
        }
    }
}

/// Filesystem layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoriesConfig {
    /// Root for per-family job artifact directories (`<data>/<family>/<uid>.*`)
    pub data: PathBuf,
    /// Location of the external algorithm executables
    pub scripts: PathBuf,
    /// Shared derived files (input networks, ranking network, validation networks)
    pub static_files: PathBuf,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            data: PathBuf::from("data"),
            scripts: PathBuf::from("scripts"),
            static_files: PathBuf::from("static"),
        }
    }
}

impl DirectoriesConfig {
    /// Artifact directory for a job family, e.g. `<data>/diamond`
    pub fn family_dir(&self, family: &str) -> PathBuf {
        self.data.join(family)
    }
}

/// Job subsystem tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Redis list used as the durable job queue
    pub queue_key: String,
    /// Maximum number of jobs executing concurrently per worker process
    pub max_concurrent_jobs: usize,
    /// How long a worker blocks on the queue before re-checking for shutdown
    pub queue_poll_seconds: u64,
    /// Upper bound on waiting for a family lock before failing the submission
    pub lock_acquire_timeout_ms: u64,
    /// Auto-release backstop for crashed lock holders. Locks are only ever
    /// held for store lookups and status writes, so this is far above any
    /// legitimate hold time.
    pub lock_ttl_seconds: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            queue_key: "biograph:jobs:queue".to_string(),
            max_concurrent_jobs: 4,
            queue_poll_seconds: 5,
            lock_acquire_timeout_ms: 5_000,
            lock_ttl_seconds: 1_800,
        }
    }
}

/// API-key authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// When false the API is open and the `x-api-key` header is ignored
    pub require_api_keys: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            require_api_keys: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridable via `RUST_LOG`
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Graph-builder vocabulary: the node and edge collections exposed by the
/// backing database. Build requests are validated against these lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub node_collections: Vec<String>,
    pub edge_collections: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            node_collections: [
                "disorder",
                "drug",
                "gene",
                "pathway",
                "protein",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            edge_collections: [
                "disorder_comorbid_with_disorder",
                "disorder_is_subtype_of_disorder",
                "drug_has_indication",
                "drug_has_target",
                "gene_associated_with_disorder",
                "is_isoform_of",
                "molecule_similarity_molecule",
                "protein_encoded_by_gene",
                "protein_in_pathway",
                "protein_interacts_with_protein",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        // Add environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        // Local config and environment variables win
        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("BIOGRAPH").separator("__"));

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn family_dir_joins_data_root() {
        let dirs = DirectoriesConfig {
            data: PathBuf::from("/var/lib/biograph"),
            ..Default::default()
        };
        assert_eq!(
            dirs.family_dir("diamond"),
            PathBuf::from("/var/lib/biograph/diamond")
        );
    }

    #[test]
    fn graph_vocabulary_contains_core_collections() {
        let graph = GraphConfig::default();
        assert!(graph.node_collections.iter().any(|c| c == "protein"));
        assert!(graph
            .edge_collections
            .iter()
            .any(|c| c == "protein_interacts_with_protein"));
    }
}
