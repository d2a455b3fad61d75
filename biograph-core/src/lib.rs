//! BioGraph core - shared kernel
//!
//! Configuration, logging initialization, the storage backend abstraction
//! used by the job subsystem, and the API-key repository.

pub mod config;
pub mod infrastructure;
pub mod logging;

pub use config::{Config, ConfigLoadError};
pub use logging::init_tracing;
