//! Configuration validation

use super::Config;

/// Error raised when a configuration value is unusable
#[derive(Debug, thiserror::Error)]
#[error("{section}: {message}")]
pub struct ValidationError {
    pub section: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(section: &'static str, message: impl Into<String>) -> Self {
        Self {
            section,
            message: message.into(),
        }
    }
}

/// Implemented by configuration sections that carry invariants beyond what
/// deserialization can express.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.server.port == 0 {
            return Err(ValidationError::new("server", "port must be non-zero"));
        }
        if self.server.request_timeout_seconds == 0 {
            return Err(ValidationError::new(
                "server",
                "request_timeout_seconds must be > 0",
            ));
        }
        if self.storage.redis_url.is_empty() {
            return Err(ValidationError::new("storage", "redis_url must be set"));
        }
        if self.jobs.max_concurrent_jobs == 0 {
            return Err(ValidationError::new(
                "jobs",
                "max_concurrent_jobs must be > 0",
            ));
        }
        if self.jobs.lock_acquire_timeout_ms == 0 {
            return Err(ValidationError::new(
                "jobs",
                "lock_acquire_timeout_ms must be > 0",
            ));
        }
        if self.jobs.lock_ttl_seconds == 0 {
            return Err(ValidationError::new("jobs", "lock_ttl_seconds must be > 0"));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ValidationError::new(
                "logging",
                format!("unknown format {:?}, expected `pretty` or `json`", self.logging.format),
            ));
        }
        if self.graph.node_collections.is_empty() || self.graph.edge_collections.is_empty() {
            return Err(ValidationError::new(
                "graph",
                "node_collections and edge_collections must be non-empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "yaml".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.section, "logging");
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = Config::default();
        config.jobs.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());
    }
}
