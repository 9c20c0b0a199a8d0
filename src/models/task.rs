use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Status of an image classification task.
///
/// The only transition is Pending -> Completed; a task whose processing keeps
/// failing stays Pending and is retried through queue redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum TaskStatus {
    Pending,
    Completed,
}

/// One task record, keyed by task id. The state store is the source of truth
/// for status queries.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub image_key: String,
    pub labels: Vec<String>,
    pub result: Option<String>,
    pub result_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Request to submit an image for classification.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequest {
    /// Base64-encoded image bytes.
    #[garde(length(min = 1))]
    pub image: Option<String>,

    /// Preferred file extension for the stored image (e.g. "jpg").
    #[garde(length(min = 1, max = 8))]
    pub extension: Option<String>,
}

/// Response after accepting a submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    #[serde(rename = "taskId")]
    pub task_id: Uuid,
}

/// Response for a result lookup. Field names follow the task record's wire
/// format: PascalCase keys, with the completion time exposed as `Timestamp`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskResultResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub labels: Vec<String>,
    pub image_key: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<TaskRecord> for TaskResultResponse {
    fn from(record: TaskRecord) -> Self {
        Self {
            task_id: record.task_id,
            status: record.status,
            result: record.result,
            labels: record.labels,
            image_key: record.image_key,
            timestamp: record.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(TaskStatus::Pending.to_string(), "Pending");
        assert_eq!("Completed".parse::<TaskStatus>().unwrap(), TaskStatus::Completed);
        assert!("Cancelled".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn submit_response_uses_camel_case_task_id() {
        let response = SubmitResponse { task_id: Uuid::nil() };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "taskId": "00000000-0000-0000-0000-000000000000" })
        );
    }

    #[test]
    fn result_response_uses_record_wire_format() {
        let record = TaskRecord {
            task_id: Uuid::nil(),
            status: TaskStatus::Completed,
            image_key: "images/00000000-0000-0000-0000-000000000000.jpg".to_string(),
            labels: vec!["cat".to_string()],
            result: Some("cat".to_string()),
            result_key: Some("results/00000000-0000-0000-0000-000000000000/result.txt".to_string()),
            created_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };

        let value = serde_json::to_value(TaskResultResponse::from(record)).unwrap();
        let object = value.as_object().unwrap();
        for key in ["TaskId", "Status", "Result", "Labels", "ImageKey", "Timestamp"] {
            assert!(object.contains_key(key), "missing key {key}");
        }
        assert_eq!(object["Status"], "Completed");
        assert_eq!(object["Result"], "cat");
    }
}
