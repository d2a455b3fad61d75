//! Shared presentation DTOs

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// `?uid=` query used by every status/download route
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct UidQuery {
    /// Job UID returned by the submit route
    pub uid: Uuid,
}

/// API-key generation request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ApiKeyGenRequest {
    /// Must be set to `true` to accept the licence terms
    pub accept_eula: Option<bool>,
}

/// API-key revocation request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ApiKeyRequest {
    pub api_key: Option<String>,
}
