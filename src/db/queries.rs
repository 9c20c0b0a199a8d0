use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::task::{TaskRecord, TaskStatus};

/// Insert the initial Pending record for a freshly submitted image.
pub async fn create_task(
    pool: &PgPool,
    task_id: Uuid,
    image_key: &str,
) -> Result<TaskRecord, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO image_tasks (task_id, status, image_key)
        VALUES ($1, 'Pending', $2)
        RETURNING task_id, status, image_key, labels, result, result_key,
                  created_at, completed_at
        "#,
    )
    .bind(task_id)
    .bind(image_key)
    .fetch_one(pool)
    .await?;

    task_from_row(&row)
}

/// Get a task record by id.
pub async fn get_task(pool: &PgPool, task_id: Uuid) -> Result<Option<TaskRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT task_id, status, image_key, labels, result, result_key,
               created_at, completed_at
        FROM image_tasks
        WHERE task_id = $1
        "#,
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(task_from_row).transpose()
}

/// Overwrite the record with the completed outcome.
///
/// Deliberately unconditional (last writer wins): redelivered messages
/// reprocess the same image and must be able to write the same outcome again
/// without a version check.
pub async fn complete_task(
    pool: &PgPool,
    task_id: Uuid,
    labels_json: &str,
    result: &str,
    result_key: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE image_tasks
        SET status = 'Completed',
            labels = $2,
            result = $3,
            result_key = $4,
            completed_at = NOW()
        WHERE task_id = $1
        "#,
    )
    .bind(task_id)
    .bind(labels_json)
    .bind(result)
    .bind(result_key)
    .execute(pool)
    .await?;

    Ok(())
}

fn task_from_row(row: &PgRow) -> Result<TaskRecord, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let labels: String = row.try_get("labels")?;

    Ok(TaskRecord {
        task_id: row.try_get("task_id")?,
        status: status.parse().unwrap_or(TaskStatus::Pending),
        image_key: row.try_get("image_key")?,
        labels: serde_json::from_str(&labels).unwrap_or_default(),
        result: row.try_get("result")?,
        result_key: row.try_get("result_key")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}
