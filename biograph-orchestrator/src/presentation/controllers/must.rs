//! MuST routes

use axum::extract::{Query, State};
use axum::Json;
use uuid::Uuid;

use crate::families::must::{self, MustRequest};
use crate::presentation::error::ApiError;
use crate::presentation::models::UidQuery;

use super::ApiState;

/// Submit a MuST job. `hubpenalty`, `multiple`, `trees` and `maxit` are all
/// required alongside the seeds.
#[utoipa::path(
    post,
    path = "/must/submit",
    request_body = MustRequest,
    responses(
        (status = 200, description = "UID for polling the job", body = Uuid),
        (status = 400, description = "Missing or invalid parameter")
    ),
    tag = "MuST"
)]
pub async fn submit(
    State(state): State<ApiState>,
    Json(request): Json<MustRequest>,
) -> Result<Json<Uuid>, ApiError> {
    let params = must::normalize(request)?;
    super::submit(&state.must, params).await
}

/// Job details: canonical parameters, status, and error or result.
#[utoipa::path(
    get,
    path = "/must/status",
    params(UidQuery),
    responses((status = 200, description = "Job document, or an empty mapping for an unknown UID")),
    tag = "MuST"
)]
pub async fn status(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    super::status(&state.must, query.uid).await
}
