//! Administrative routes: job resubmission and API-key management.

use axum::extract::{Path, State};
use axum::Json;
use tracing::warn;
use uuid::Uuid;

use crate::presentation::error::ApiError;
use crate::presentation::models::{ApiKeyGenRequest, ApiKeyRequest};

use super::ApiState;

/// Reset a job to `submitted` (clearing its prior outcome) and re-queue it
/// under the same UID.
#[utoipa::path(
    post,
    path = "/admin/resubmit/{family}/{uid}",
    params(
        ("family" = String, Path, description = "Job family name"),
        ("uid" = Uuid, Path, description = "Job UID")
    ),
    responses(
        (status = 200, description = "Job reset and re-queued"),
        (status = 404, description = "Unknown family or UID")
    ),
    tag = "Admin"
)]
pub async fn resubmit(
    State(state): State<ApiState>,
    Path((family, uid)): Path<(String, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reset = match family.as_str() {
        "diamond" => state.diamond.resubmit(uid).await?,
        "must" => state.must.resubmit(uid).await?,
        "domino" => state.domino.resubmit(uid).await?,
        "kpm" => state.kpm.resubmit(uid).await?,
        "robust" => state.robust.resubmit(uid).await?,
        "trustrank" => state.trustrank.resubmit(uid).await?,
        "closeness" => state.closeness.resubmit(uid).await?,
        "validation" => state.validation.resubmit(uid).await?,
        "graphs" => state.graphs.resubmit(uid).await?,
        "bicon" => state.bicon.resubmit(uid).await?,
        unknown => {
            return Err(ApiError::NotFound(format!(
                "Unknown job family {:?}",
                unknown
            )));
        }
    };

    if !reset {
        return Err(ApiError::NotFound(format!(
            "No {} job with UID {}",
            family, uid
        )));
    }
    Ok(Json(serde_json::json!({ "uid": uid, "status": "submitted" })))
}

/// Generate a new API key. The plaintext key is returned exactly once.
#[utoipa::path(
    post,
    path = "/admin/api_key/generate",
    request_body = ApiKeyGenRequest,
    responses(
        (status = 200, description = "Freshly generated API key", body = String),
        (status = 400, description = "Licence terms not accepted")
    ),
    tag = "Admin"
)]
pub async fn generate_api_key(
    State(state): State<ApiState>,
    Json(request): Json<ApiKeyGenRequest>,
) -> Result<Json<String>, ApiError> {
    if request.accept_eula != Some(true) {
        return Err(ApiError::BadRequest(
            "The licence terms must be accepted to obtain an API key".to_string(),
        ));
    }
    let key = state.api_keys.generate().await.map_err(|e| {
        warn!(error = %e, "API-key generation failed");
        ApiError::Unavailable("Storage backend unavailable".to_string())
    })?;
    Ok(Json(key))
}

/// Revoke an API key.
#[utoipa::path(
    post,
    path = "/admin/api_key/revoke",
    request_body = ApiKeyRequest,
    responses(
        (status = 200, description = "Whether a key was revoked"),
        (status = 400, description = "No key supplied")
    ),
    tag = "Admin"
)]
pub async fn revoke_api_key(
    State(state): State<ApiState>,
    Json(request): Json<ApiKeyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(key) = request.api_key else {
        return Err(ApiError::BadRequest("api_key must be supplied".to_string()));
    };
    let revoked = state.api_keys.revoke(&key).await.map_err(|e| {
        warn!(error = %e, "API-key revocation failed");
        ApiError::Unavailable("Storage backend unavailable".to_string())
    })?;
    Ok(Json(serde_json::json!({ "revoked": revoked })))
}
