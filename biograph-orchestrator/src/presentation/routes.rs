//! Route definitions and router assembly

use std::time::Duration;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use biograph_core::config::ServerConfig;

use crate::presentation::controllers::{
    admin, bicon, closeness, diamond, domino, graphs, health, kpm, must, robust, trustrank,
    validation,
};
use crate::presentation::middleware::{api_key_middleware, AuthState};

pub use crate::presentation::controllers::ApiState;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::controllers::diamond::submit,
        crate::presentation::controllers::diamond::status,
        crate::presentation::controllers::diamond::download,
        crate::presentation::controllers::must::submit,
        crate::presentation::controllers::must::status,
        crate::presentation::controllers::domino::submit,
        crate::presentation::controllers::domino::status,
        crate::presentation::controllers::kpm::submit,
        crate::presentation::controllers::kpm::status,
        crate::presentation::controllers::robust::submit,
        crate::presentation::controllers::robust::status,
        crate::presentation::controllers::robust::results,
        crate::presentation::controllers::trustrank::submit,
        crate::presentation::controllers::trustrank::status,
        crate::presentation::controllers::trustrank::download,
        crate::presentation::controllers::closeness::submit,
        crate::presentation::controllers::closeness::status,
        crate::presentation::controllers::closeness::download,
        crate::presentation::controllers::validation::submit_joint,
        crate::presentation::controllers::validation::submit_module,
        crate::presentation::controllers::validation::submit_drug,
        crate::presentation::controllers::validation::status,
        crate::presentation::controllers::graphs::builder,
        crate::presentation::controllers::graphs::details,
        crate::presentation::controllers::graphs::download,
        crate::presentation::controllers::bicon::submit,
        crate::presentation::controllers::bicon::status,
        crate::presentation::controllers::bicon::clustermap,
        crate::presentation::controllers::bicon::download,
        crate::presentation::controllers::admin::resubmit,
        crate::presentation::controllers::admin::generate_api_key,
        crate::presentation::controllers::admin::revoke_api_key,
        crate::presentation::controllers::health::health_check,
    ),
    components(schemas(
        crate::families::diamond::DiamondRequest,
        crate::families::must::MustRequest,
        crate::families::domino::DominoRequest,
        crate::families::kpm::KpmRequest,
        crate::families::robust::RobustRequest,
        crate::families::trustrank::TrustRankRequest,
        crate::families::closeness::ClosenessRequest,
        crate::families::validation::JointValidationRequest,
        crate::families::validation::ModuleValidationRequest,
        crate::families::validation::DrugValidationRequest,
        crate::families::graph::BuildRequest,
        crate::presentation::models::ApiKeyGenRequest,
        crate::presentation::models::ApiKeyRequest,
    )),
    info(
        title = "BioGraph API",
        description = "API for the BioGraph biomedical knowledge graph and its \
                       network-biology job orchestrator. Algorithm runs are \
                       asynchronous: submit routes return a UID, status routes \
                       are polled with it."
    )
)]
pub struct ApiDoc;

/// Assemble the application router.
pub fn create_router(state: ApiState, auth: AuthState, server: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/diamond/submit", post(diamond::submit))
        .route("/diamond/status", get(diamond::status))
        .route("/diamond/download", get(diamond::download))
        .route("/must/submit", post(must::submit))
        .route("/must/status", get(must::status))
        .route("/domino/submit", post(domino::submit))
        .route("/domino/status", get(domino::status))
        .route("/kpm/submit", post(kpm::submit))
        .route("/kpm/status", get(kpm::status))
        .route("/robust/submit", post(robust::submit))
        .route("/robust/status", get(robust::status))
        .route("/robust/results", get(robust::results))
        .route("/trustrank/submit", post(trustrank::submit))
        .route("/trustrank/status", get(trustrank::status))
        .route("/trustrank/download", get(trustrank::download))
        .route("/closeness/submit", post(closeness::submit))
        .route("/closeness/status", get(closeness::status))
        .route("/closeness/download", get(closeness::download))
        .route("/validation/joint", post(validation::submit_joint))
        .route("/validation/module", post(validation::submit_module))
        .route("/validation/drug", post(validation::submit_drug))
        .route("/validation/status", get(validation::status))
        .route("/graph/builder", post(graphs::builder))
        .route("/graph/details/{uid}", get(graphs::details))
        .route("/graph/download/{uid}", get(graphs::download))
        .route("/bicon/submit", post(bicon::submit))
        .route("/bicon/status", get(bicon::status))
        .route("/bicon/clustermap", get(bicon::clustermap))
        .route("/bicon/download", get(bicon::download))
        .route("/admin/resubmit/{family}/{uid}", post(admin::resubmit))
        .route("/admin/api_key/generate", post(admin::generate_api_key))
        .route("/admin/api_key/revoke", post(admin::revoke_api_key))
        .with_state(state)
        .layer(middleware::from_fn_with_state(auth, api_key_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    server.request_timeout_seconds,
                ))),
        );

    if server.enable_docs {
        router = router
            .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
}
