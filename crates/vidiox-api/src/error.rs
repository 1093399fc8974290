//! API error types.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use vidiox_models::UploadError;
use vidiox_queue::QueueError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidUpload(#[from] UploadError),

    #[error("Job not found")]
    JobNotFound,

    #[error("Job tracking not available")]
    TrackingUnavailable,

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Upload failed: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    /// Map a failed enqueue to the error returned to the uploader.
    pub fn from_enqueue(err: &QueueError) -> Self {
        match err {
            QueueError::QueueFull { .. } => {
                Self::service_unavailable("Job queue is full, try again later")
            }
            _ => Self::service_unavailable("Job queue not available"),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::JobNotFound => StatusCode::NOT_FOUND,
            ApiError::TrackingUnavailable | ApiError::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Multipart(e) => e.status(),
            ApiError::Internal(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Status lookups: a missing record is a 404, an unreachable store a 503.
impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::JobNotFound(_) => ApiError::JobNotFound,
            QueueError::StatusStoreUnavailable(_) => ApiError::TrackingUnavailable,
            other => ApiError::internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let error = match &self {
            ApiError::Internal(_) | ApiError::Io(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}
