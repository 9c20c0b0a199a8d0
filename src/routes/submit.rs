use axum::extract::State;
use axum::Json;
use base64::Engine;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::task::{SubmitRequest, SubmitResponse};
use crate::routes::ApiError;

/// POST /api/v1/images — submit an image for asynchronous classification.
pub async fn submit_image(
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    payload
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let encoded = payload
        .image
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::MissingImage)?;

    let image_bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| ApiError::InvalidImage)?;

    let task_id = state
        .submission
        .submit(&image_bytes, payload.extension.as_deref())
        .await?;

    Ok(Json(SubmitResponse { task_id }))
}
