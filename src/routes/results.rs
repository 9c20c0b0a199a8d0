use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::task::TaskResultResponse;
use crate::routes::ApiError;

/// GET /api/v1/results/{task_id} — look up the state of a task.
///
/// Reads the state store only; a task that keeps failing in the worker is
/// indistinguishable from a slow one and stays Pending here.
pub async fn get_result(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskResultResponse>, ApiError> {
    let record = queries::get_task(&state.db, task_id)
        .await
        .map_err(|e| {
            tracing::error!(task_id = %task_id, error = %e, "Failed to load task record");
            ApiError::Internal
        })?
        .ok_or(ApiError::NotFound(task_id))?;

    Ok(Json(record.into()))
}
