use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::services::submission::SubmitError;

pub mod auth;
pub mod health;
pub mod metrics;
pub mod results;
pub mod submit;

/// HTTP-facing error taxonomy. Everything infra-shaped collapses to a 500
/// after being logged; the client never sees internal detail.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing image data")]
    MissingImage,

    #[error("Invalid image data")]
    InvalidImage,

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Validation(String),

    #[error("Missing or invalid bearer credential")]
    Unauthorized,

    #[error("No results found for TaskId: {0}")]
    NotFound(Uuid),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingImage
            | ApiError::InvalidImage
            | ApiError::UnsupportedFormat(_)
            | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::InvalidImage => ApiError::InvalidImage,
            SubmitError::UnsupportedFormat(format) => ApiError::UnsupportedFormat(format),
            other => {
                tracing::error!(error = %other, "Submission failed");
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        assert_eq!(ApiError::MissingImage.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidImage.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::UnsupportedFormat("Gif".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn unknown_task_maps_to_not_found() {
        assert_eq!(ApiError::NotFound(Uuid::nil()).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn infra_submit_errors_collapse_to_internal() {
        let err: ApiError = SubmitError::Database(sqlx::Error::PoolClosed).into();
        assert!(matches!(err, ApiError::Internal));
    }
}
