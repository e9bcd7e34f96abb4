//! REST API endpoints for image upload and report submission

use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use actix_web::{post, web, HttpResponse, Responder};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::app::AppState;
use crate::model::{Coordinates, ReportOutcome};
use crate::pipeline::ReportRequest;

/// Upload size limit, matching the multipart field limit below
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Multipart form for a standalone image upload
#[derive(Debug, MultipartForm)]
pub struct UploadForm {
    #[multipart(limit = "10MB")]
    pub image: TempFile,
}

/// Multipart form for a full report submission
#[derive(Debug, MultipartForm)]
pub struct ReportForm {
    #[multipart(limit = "10MB")]
    pub image: TempFile,
    pub latitude: Text<f64>,
    pub longitude: Text<f64>,
}

/// Stored upload metadata
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub id: Uuid,
    pub filename: String,
    pub original_name: Option<String>,
    pub path: String,
    pub size: usize,
    pub content_type: String,
    /// SHA-256 of the image content
    pub content_hash: String,
    pub uploaded_at: String,
}

struct StoredImage {
    id: Uuid,
    filename: String,
    path: std::path::PathBuf,
    bytes: Vec<u8>,
    content_type: String,
    content_hash: String,
}

/// Validate and persist an uploaded image under a fresh UUID filename
async fn store_image(state: &AppState, file: &TempFile) -> Result<StoredImage, ApiError> {
    let content_type = file
        .content_type
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_default();
    if !content_type.starts_with("image/") {
        return Err(ApiError::UnsupportedMediaType(format!(
            "expected an image, got {content_type:?}"
        )));
    }

    let bytes = tokio::fs::read(file.file.path()).await?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("uploaded image is empty".to_string()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::PayloadTooLarge(format!(
            "image is {} bytes, limit is {MAX_IMAGE_BYTES}",
            bytes.len()
        )));
    }

    let extension = file
        .file_name
        .as_deref()
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|e| e.to_str())
        .unwrap_or("jpg");

    let id = Uuid::new_v4();
    let filename = format!("{id}.{extension}");
    let path = state.config.upload_dir.join(&filename);

    tokio::fs::create_dir_all(&state.config.upload_dir).await?;
    tokio::fs::write(&path, &bytes).await?;

    let content_hash = format!("{:x}", Sha256::digest(&bytes));
    tracing::info!(
        upload_id = %id,
        size = bytes.len(),
        content_hash = %content_hash,
        "image stored"
    );

    Ok(StoredImage {
        id,
        filename,
        path,
        bytes,
        content_type,
        content_hash,
    })
}

/// Upload an image without submitting a report
#[utoipa::path(
    post,
    path = "/api/v1/upload",
    responses(
        (status = 201, description = "Image uploaded", body = UploadResponse),
        (status = 400, description = "Invalid upload"),
        (status = 413, description = "Image too large"),
        (status = 415, description = "Not an image")
    ),
    tag = "reports"
)]
#[post("/api/v1/upload")]
pub async fn upload_image(
    state: web::Data<AppState>,
    form: MultipartForm<UploadForm>,
) -> Result<impl Responder, ApiError> {
    let stored = store_image(&state, &form.image).await?;

    Ok(HttpResponse::Created().json(UploadResponse {
        id: stored.id,
        filename: stored.filename,
        original_name: form.image.file_name.clone(),
        path: stored.path.display().to_string(),
        size: stored.bytes.len(),
        content_type: stored.content_type,
        content_hash: stored.content_hash,
        uploaded_at: Utc::now().to_rfc3339(),
    }))
}

/// Submit a report: classify the image, resolve the destination form, and
/// drive the automation adapter. Always returns a terminal outcome record;
/// rejections and pipeline failures are outcomes, not HTTP errors.
#[utoipa::path(
    post,
    path = "/api/v1/reports",
    responses(
        (status = 200, description = "Pipeline finished with a terminal outcome", body = ReportOutcome),
        (status = 400, description = "Invalid request"),
        (status = 413, description = "Image too large"),
        (status = 415, description = "Not an image")
    ),
    tag = "reports"
)]
#[post("/api/v1/reports")]
pub async fn submit_report(
    state: web::Data<AppState>,
    form: MultipartForm<ReportForm>,
) -> Result<impl Responder, ApiError> {
    let ReportForm {
        image,
        latitude,
        longitude,
    } = form.into_inner();
    let latitude = latitude.into_inner();
    let longitude = longitude.into_inner();
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(ApiError::BadRequest(format!(
            "coordinates out of range: ({latitude}, {longitude})"
        )));
    }

    let stored = store_image(&state, &image).await?;

    let outcome = state
        .pipeline
        .run(ReportRequest {
            image: stored.bytes,
            image_path: stored.path.display().to_string(),
            coordinates: Coordinates {
                latitude,
                longitude,
            },
        })
        .await;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Configure report routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(upload_image).service(submit_report);
}
