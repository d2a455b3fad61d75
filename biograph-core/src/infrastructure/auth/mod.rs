//! API-key authentication support

mod api_keys;

pub use api_keys::{ApiKeyError, ApiKeyRepository};
