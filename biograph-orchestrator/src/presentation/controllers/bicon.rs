//! BiCoN routes

use std::path::Path as FsPath;

use axum::extract::{Multipart, Query, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::families::bicon;
use crate::presentation::error::ApiError;
use crate::presentation::models::UidQuery;

use super::ApiState;

/// Submit a BiCoN job: a multipart upload with an `expression_file` part
/// and optional `lg_min`, `lg_max` and `network` parts. Re-uploading the
/// same matrix with the same parameters returns the existing UID.
#[utoipa::path(
    post,
    path = "/bicon/submit",
    responses(
        (status = 200, description = "UID for polling the job", body = Uuid),
        (status = 400, description = "Missing upload or invalid parameter")
    ),
    tag = "BiCoN"
)]
pub async fn submit(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<Uuid>, ApiError> {
    let mut expression: Option<(Vec<u8>, String)> = None;
    let mut lg_min = None;
    let mut lg_max = None;
    let mut network = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("expression_file") => {
                let extension = field
                    .file_name()
                    .and_then(|name| FsPath::new(name).extension())
                    .map(|ext| format!(".{}", ext.to_string_lossy()))
                    .unwrap_or_default();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Unreadable upload: {}", e)))?;
                expression = Some((bytes.to_vec(), extension));
            }
            Some("lg_min") => lg_min = Some(parse_field(field, "lg_min").await?),
            Some("lg_max") => lg_max = Some(parse_field(field, "lg_max").await?),
            Some("network") => {
                network = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Unreadable network field: {}", e))
                })?);
            }
            _ => {}
        }
    }

    let Some((bytes, extension)) = expression else {
        return Err(ApiError::BadRequest(
            "expression_file must be supplied".to_string(),
        ));
    };
    let params = bicon::normalize(&bytes, lg_min, lg_max, network.as_deref())?;

    let (uid, created) = state.bicon.find_or_create(&params).await?;
    if created {
        // The upload must be on disk before the job becomes runnable
        let upload_dir = bicon::upload_dir(&state.dirs, uid);
        tokio::fs::create_dir_all(&upload_dir)
            .await
            .map_err(|_| ApiError::Internal)?;
        tokio::fs::write(upload_dir.join(format!("{}{}", uid, extension)), &bytes)
            .await
            .map_err(|_| ApiError::Internal)?;
        state.bicon.enqueue(uid).await?;
    }

    Ok(Json(uid))
}

async fn parse_field(
    field: axum::extract::multipart::Field<'_>,
    name: &'static str,
) -> Result<u32, ApiError> {
    let text = field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Unreadable {} field: {}", name, e)))?;
    text.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("{} must be an integer", name)))
}

/// Job details: canonical parameters, status, and error or result.
#[utoipa::path(
    get,
    path = "/bicon/status",
    params(UidQuery),
    responses((status = 200, description = "Job document, or an empty mapping for an unknown UID")),
    tag = "BiCoN"
)]
pub async fn status(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    super::status(&state.bicon, query.uid).await
}

/// Clustermap image of a completed job.
#[utoipa::path(
    get,
    path = "/bicon/clustermap",
    params(UidQuery),
    responses(
        (status = 200, description = "Clustermap PNG"),
        (status = 404, description = "Unknown UID or job not completed")
    ),
    tag = "BiCoN"
)]
pub async fn clustermap(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Response, ApiError> {
    super::completed_document(&state.bicon, query.uid, "BiCoN").await?;
    super::serve_file(&bicon::clustermap_path(&state.dirs, query.uid), "image/png").await
}

/// Zipped results of a completed job.
#[utoipa::path(
    get,
    path = "/bicon/download",
    params(UidQuery),
    responses(
        (status = 200, description = "Zipped result bundle"),
        (status = 404, description = "Unknown UID or job not completed")
    ),
    tag = "BiCoN"
)]
pub async fn download(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Response, ApiError> {
    super::completed_document(&state.bicon, query.uid, "BiCoN").await?;
    super::serve_file(&bicon::zip_path(&state.dirs, query.uid), "application/zip").await
}
