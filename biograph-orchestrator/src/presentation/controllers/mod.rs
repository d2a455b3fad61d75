//! Route handlers
//!
//! One module per job family plus admin and health. Every family exposes the
//! same shape - submit, status, and a download route where it produces an
//! artifact - so the family modules are thin wrappers over the shared
//! helpers here.

pub mod admin;
pub mod bicon;
pub mod closeness;
pub mod diamond;
pub mod domino;
pub mod graphs;
pub mod health;
pub mod kpm;
pub mod must;
pub mod robust;
pub mod trustrank;
pub mod validation;

use std::path::Path;
use std::sync::Arc;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;
use uuid::Uuid;

use biograph_core::config::{DirectoriesConfig, GraphConfig};
use biograph_core::infrastructure::auth::ApiKeyRepository;

use crate::application::service::JobService;
use crate::families;
use crate::families::JobFamily;
use crate::presentation::error::ApiError;

/// Shared handler state: one service per family plus presentation config.
#[derive(Clone)]
pub struct ApiState {
    pub diamond: Arc<JobService<families::diamond::DiamondFamily>>,
    pub must: Arc<JobService<families::must::MustFamily>>,
    pub domino: Arc<JobService<families::domino::DominoFamily>>,
    pub kpm: Arc<JobService<families::kpm::KpmFamily>>,
    pub robust: Arc<JobService<families::robust::RobustFamily>>,
    pub trustrank: Arc<JobService<families::trustrank::TrustRankFamily>>,
    pub closeness: Arc<JobService<families::closeness::ClosenessFamily>>,
    pub validation: Arc<JobService<families::validation::ValidationFamily>>,
    pub graphs: Arc<JobService<families::graph::GraphFamily>>,
    pub bicon: Arc<JobService<families::bicon::BiconFamily>>,
    pub api_keys: Arc<ApiKeyRepository>,
    pub dirs: DirectoriesConfig,
    pub graph_config: GraphConfig,
}

/// Submit a canonical request, returning the (possibly pre-existing) UID.
pub(crate) async fn submit<F: JobFamily>(
    service: &JobService<F>,
    request: F::Request,
) -> Result<Json<Uuid>, ApiError> {
    Ok(Json(service.submit(request).await?))
}

/// Stored job document, or an empty mapping for an unknown UID.
pub(crate) async fn status<F: JobFamily>(
    service: &JobService<F>,
    uid: Uuid,
) -> Result<Json<serde_json::Value>, ApiError> {
    let document = service.status(uid).await?;
    Ok(Json(document.unwrap_or_else(|| serde_json::json!({}))))
}

/// The stored document of a job that must exist and be `completed`;
/// download routes gate on this.
pub(crate) async fn completed_document<F: JobFamily>(
    service: &JobService<F>,
    uid: Uuid,
    label: &str,
) -> Result<serde_json::Value, ApiError> {
    let Some(document) = service.status(uid).await? else {
        return Err(ApiError::NotFound(format!(
            "No {} job with UID {}",
            label, uid
        )));
    };
    if document["status"] != "completed" {
        return Err(ApiError::NotFound(format!(
            "{} job with UID {} does not have completed status",
            label, uid
        )));
    }
    Ok(document)
}

/// Serve a job artifact off disk.
pub(crate) async fn serve_file(
    path: &Path,
    content_type: &'static str,
) -> Result<Response, ApiError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound("Artifact not found".to_string()))
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read artifact");
            Err(ApiError::Internal)
        }
    }
}
