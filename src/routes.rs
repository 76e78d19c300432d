use crate::db::{Db, NewReport, StoredReport};
use crate::error::ApiError;
use crate::normalize;
use crate::ocr::DocumentAnalyzer;
use crate::services::notify::Notifier;
use crate::services::storage::{self, ImageStore};
use crate::types::{NotificationPayload, UploadResponse};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn, Span};

/// Handles to every outbound collaborator, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub images: Arc<dyn ImageStore>,
    pub analyzer: Arc<dyn DocumentAnalyzer>,
    pub db: Arc<Db>,
    pub notifier: Arc<dyn Notifier>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/report/upload", post(upload_lab_report))
        .route("/report/:id", get(get_report))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "lab-report-scanner",
        version: env!("CARGO_PKG_VERSION"),
    })
}

struct UploadForm {
    image: Bytes,
    content_type: String,
    user_id: String,
    phone_number: String,
}

fn bad_form(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::InvalidRequest(e.body_text())
    }
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut image = None;
    let mut content_type = None;
    let mut user_id = None;
    let mut phone_number = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                content_type = field.content_type().map(str::to_string);
                image = Some(field.bytes().await.map_err(bad_form)?);
            }
            "user_id" => user_id = Some(field.text().await.map_err(bad_form)?),
            "phone_number" => phone_number = Some(field.text().await.map_err(bad_form)?),
            _ => {}
        }
    }

    let missing = |name: &str| ApiError::InvalidRequest(format!("missing form field '{}'", name));
    Ok(UploadForm {
        image: image.ok_or_else(|| missing("file"))?,
        content_type: content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
        user_id: user_id.ok_or_else(|| missing("user_id"))?,
        phone_number: phone_number.ok_or_else(|| missing("phone_number"))?,
    })
}

/// POST /report/upload: store the image, OCR it, normalize, persist, then notify.
#[instrument(skip_all, fields(user_id = tracing::field::Empty, report_id = tracing::field::Empty))]
async fn upload_lab_report(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let form = read_upload_form(multipart).await?;
    Span::current().record("user_id", form.user_id.as_str());
    if form.image.is_empty() {
        return Err(ApiError::EmptyUpload);
    }

    let report_id = uuid::Uuid::new_v4().to_string();
    Span::current().record("report_id", report_id.as_str());

    let key = storage::object_key(&report_id, &form.content_type);
    let image_url = state
        .images
        .upload(&key, form.image.clone(), &form.content_type)
        .await?;

    let ocr_json = state.analyzer.analyze(form.image).await?;
    let report = normalize::normalize(&ocr_json)?;
    info!(
        keys = report.key_value_data.len(),
        tables = report.tables.len(),
        has_date = report.report_date.is_some(),
        "report normalized"
    );

    let db = state.db.clone();
    let (id, user_id, phone_number, url) = (
        report_id.clone(),
        form.user_id.clone(),
        form.phone_number.clone(),
        image_url.clone(),
    );
    let (report_id, report) = tokio::task::spawn_blocking(move || {
        let saved = db.save_report(&NewReport {
            id: &id,
            user_id: &user_id,
            phone_number: &phone_number,
            image_url: &url,
            report: &report,
        });
        saved.map(|saved_id| (saved_id, report))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    let payload = NotificationPayload {
        report_id: report_id.clone(),
        user_id: form.user_id,
        phone_number: form.phone_number,
        key_value_data: report.key_value_data.clone(),
        report_date: report.report_date.clone(),
        image_url: image_url.clone(),
    };
    let notification_warning = match state.notifier.notify(&payload).await {
        Ok(()) => None,
        Err(e) => {
            warn!(error = %e, "webhook notification failed");
            Some(format!("Notification not delivered: {}", e))
        }
    };

    Ok(Json(UploadResponse {
        status: "success".to_string(),
        message: "Lab report uploaded and processed".to_string(),
        report_id,
        image_url,
        key_value_data: report.key_value_data,
        report_date: report.report_date,
        notification_warning,
    }))
}

/// GET /report/:id
async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredReport>, ApiError> {
    let db = state.db.clone();
    let lookup = id.clone();
    let stored = tokio::task::spawn_blocking(move || db.get_report(&lookup))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    stored.map(Json).ok_or(ApiError::NotFound(id))
}
