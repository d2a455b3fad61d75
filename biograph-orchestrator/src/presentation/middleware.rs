//! Request-pipeline middleware
//!
//! API-key checking runs as a middleware stage ahead of dispatch rather than
//! as per-handler guards, so adding a route cannot silently skip the check.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, warn};

use biograph_core::config::AuthConfig;
use biograph_core::infrastructure::auth::ApiKeyRepository;

const API_KEY_HEADER: &str = "x-api-key";

/// Routes reachable without a key even on closed deployments. Key
/// generation stays open so new users can bootstrap one.
const OPEN_PATHS: &[&str] = &["/health", "/docs", "/api-docs", "/admin/api_key/generate"];

/// State for [`api_key_middleware`].
#[derive(Clone)]
pub struct AuthState {
    pub api_keys: Arc<ApiKeyRepository>,
    pub config: AuthConfig,
}

/// Reject requests without a valid `x-api-key` header when the deployment
/// requires keys.
pub async fn api_key_middleware(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_api_keys {
        return next.run(request).await;
    }

    let path = request.uri().path();
    if OPEN_PATHS.iter().any(|open| path.starts_with(open)) {
        return next.run(request).await;
    }

    let supplied = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    let Some(key) = supplied else {
        debug!(path, "Rejected request without API key");
        return unauthorized("An API key is required for this route");
    };

    match state.api_keys.verify(key).await {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            debug!(path, "Rejected request with unknown API key");
            unauthorized("Invalid API key")
        }
        Err(e) => {
            warn!(error = %e, "API-key verification failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "detail": "Storage backend unavailable" })),
            )
                .into_response()
        }
    }
}

fn unauthorized(detail: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "detail": detail })),
    )
        .into_response()
}
