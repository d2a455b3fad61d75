//! KeyPathwayMiner routes

use axum::extract::{Query, State};
use axum::Json;
use uuid::Uuid;

use crate::families::kpm::{self, KpmRequest};
use crate::presentation::error::ApiError;
use crate::presentation::models::UidQuery;

use super::ApiState;

/// Submit a KPM job.
#[utoipa::path(
    post,
    path = "/kpm/submit",
    request_body = KpmRequest,
    responses(
        (status = 200, description = "UID for polling the job", body = Uuid),
        (status = 400, description = "Missing or invalid parameter")
    ),
    tag = "KPM"
)]
pub async fn submit(
    State(state): State<ApiState>,
    Json(request): Json<KpmRequest>,
) -> Result<Json<Uuid>, ApiError> {
    let params = kpm::normalize(request)?;
    super::submit(&state.kpm, params).await
}

/// Job details: canonical parameters, status, and error or result.
#[utoipa::path(
    get,
    path = "/kpm/status",
    params(UidQuery),
    responses((status = 200, description = "Job document, or an empty mapping for an unknown UID")),
    tag = "KPM"
)]
pub async fn status(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    super::status(&state.kpm, query.uid).await
}
