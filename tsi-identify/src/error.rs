//! Error types for tsi-identify
//!
//! Pipeline failures are typed all the way up and only turned into HTTP
//! responses here, at the outermost boundary.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{PipelineError, TranscodeError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Malformed or oversized multipart body
    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartError),

    /// Pipeline failure, status depends on the kind
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    /// HTTP status and machine-readable code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Multipart(err) => (err.status(), "BAD_REQUEST"),
            ApiError::Pipeline(err) => match err {
                PipelineError::Transcode(TranscodeError::Failed { .. }) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "TRANSCODE_ERROR")
                }
                PipelineError::Transcode(TranscodeError::Spawn { .. }) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "TRANSCODE_ERROR")
                }
                PipelineError::Transcode(TranscodeError::TimedOut { .. }) => {
                    (StatusCode::GATEWAY_TIMEOUT, "TRANSCODE_TIMEOUT")
                }
                PipelineError::Decode(_) => (StatusCode::UNPROCESSABLE_ENTITY, "DECODE_ERROR"),
                PipelineError::FeatureComputation(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "FEATURE_ERROR")
                }
                PipelineError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
                PipelineError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
