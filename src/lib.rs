//! BioGraph - main application library
//!
//! This is the binary crate that wires the orchestrator and core together.

mod app;

pub use app::{create_app, AppHandle};
pub use biograph_core::{init_tracing, Config};

// Re-export for convenience
pub use biograph_core;
pub use biograph_orchestrator;
