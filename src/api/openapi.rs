//! OpenAPI specification endpoints

use actix_web::{get, HttpResponse, Responder};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::report::upload_image,
        crate::api::report::submit_report,
        crate::api::health::liveness,
        crate::api::health::readiness,
    ),
    components(schemas(
        crate::api::report::UploadResponse,
        crate::api::health::HealthStatus,
        crate::api::health::ReadinessStatus,
        crate::api::health::DependencyHealth,
        crate::model::ReportOutcome,
        crate::model::Coordinates,
        crate::model::report::StageTimestamps,
    )),
    tags(
        (name = "reports", description = "Civic issue report submission"),
        (name = "health", description = "Service health probes")
    ),
    info(
        title = "CivicSight Agent API",
        description = "Photo-to-municipal-report submission pipeline"
    )
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
#[get("/openapi.json")]
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Serve OpenAPI YAML specification
#[get("/openapi.yaml")]
pub async fn openapi_yaml() -> impl Responder {
    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => HttpResponse::Ok().content_type("text/yaml").body(yaml),
        Err(e) => {
            tracing::error!(error = %e, "failed to render OpenAPI YAML");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Configure OpenAPI routes
pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(openapi_json).service(openapi_yaml);
}
