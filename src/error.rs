//! HTTP-facing error type for the report API.

use crate::db::DbError;
use crate::normalize::NormalizeError;
use crate::ocr::OcrError;
use crate::services::storage::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Empty file")]
    EmptyUpload,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Malformed OCR result: {0}")]
    MalformedInput(#[from] NormalizeError),

    #[error("{0}")]
    Ocr(#[from] OcrError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("Report not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::EmptyUpload => (StatusCode::BAD_REQUEST, "EMPTY_UPLOAD"),
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ApiError::MalformedInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, "MALFORMED_INPUT"),
            ApiError::Ocr(
                OcrError::Submission { .. }
                | OcrError::SubmissionUnreachable(_)
                | OcrError::MissingOperationLocation,
            ) => {
                (StatusCode::BAD_GATEWAY, "OCR_SUBMISSION_FAILED")
            }
            ApiError::Ocr(OcrError::Timeout { .. }) => (StatusCode::GATEWAY_TIMEOUT, "OCR_TIMEOUT"),
            ApiError::Ocr(_) => (StatusCode::BAD_GATEWAY, "OCR_FAILED"),
            ApiError::Storage(_) => (StatusCode::BAD_GATEWAY, "STORAGE_FAILED"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(code, error = %self, "request failed");
        }
        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}
