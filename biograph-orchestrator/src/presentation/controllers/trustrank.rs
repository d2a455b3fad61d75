//! TrustRank routes

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::families::trustrank::{self, TrustRankRequest};
use crate::presentation::error::ApiError;
use crate::presentation::models::UidQuery;

use super::ApiState;

/// Submit a TrustRank job. Seeds are UniProt accessions, optionally
/// `uniprot.`-prefixed.
#[utoipa::path(
    post,
    path = "/trustrank/submit",
    request_body = TrustRankRequest,
    responses(
        (status = 200, description = "UID for polling the job", body = Uuid),
        (status = 400, description = "Missing or invalid parameter")
    ),
    tag = "TrustRank"
)]
pub async fn submit(
    State(state): State<ApiState>,
    Json(request): Json<TrustRankRequest>,
) -> Result<Json<Uuid>, ApiError> {
    let params = trustrank::normalize(request)?;
    super::submit(&state.trustrank, params).await
}

/// Job details: canonical parameters, status, and error or result.
#[utoipa::path(
    get,
    path = "/trustrank/status",
    params(UidQuery),
    responses((status = 200, description = "Job document, or an empty mapping for an unknown UID")),
    tag = "TrustRank"
)]
pub async fn status(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    super::status(&state.trustrank, query.uid).await
}

/// Full drug ranking of a completed job.
#[utoipa::path(
    get,
    path = "/trustrank/download",
    params(UidQuery),
    responses(
        (status = 200, description = "Score-ordered drug ranking (TSV)"),
        (status = 404, description = "Unknown UID or job not completed")
    ),
    tag = "TrustRank"
)]
pub async fn download(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Response, ApiError> {
    super::completed_document(&state.trustrank, query.uid, "TrustRank").await?;
    super::serve_file(
        &trustrank::artifact_path(&state.dirs, query.uid),
        "text/plain",
    )
    .await
}
