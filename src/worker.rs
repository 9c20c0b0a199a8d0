//! Queue-consuming worker loop.
//!
//! Each worker is an independent polling loop: it blocks on `receive` with a
//! bounded wait, processes at most one message at a time, and only
//! acknowledges a message after the task record and result artifact are both
//! written. A failure anywhere before that leaves the message in flight, and
//! the queue's visibility timeout redelivers it. Reprocessing is safe because
//! the completion write is an unconditional overwrite.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::PgPool;
use tokio::time::sleep;

use crate::db::queries;
use crate::services::detector::{DetectError, Detection, Detector};
use crate::services::queue::{QueueError, QueueMessage, TaskQueue};
use crate::services::storage::{self, BlobStore, StorageError};

/// Detections at or below this confidence are discarded.
const CONFIDENCE_THRESHOLD: f32 = 0.2;

/// Result string for tasks where nothing was detected.
const NO_OBJECTS_SENTINEL: &str = "No objects detected";

/// Pause after a queue receive error before polling again.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// How often the heartbeat reports queue liveness.
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(15);

/// A single polling loop of the worker pool.
pub struct Worker<D: Detector> {
    id: usize,
    db: PgPool,
    storage: Arc<BlobStore>,
    queue: Arc<TaskQueue>,
    detector: Arc<D>,
    poll_wait: Duration,
}

impl<D: Detector> Worker<D> {
    pub fn new(
        id: usize,
        db: PgPool,
        storage: Arc<BlobStore>,
        queue: Arc<TaskQueue>,
        detector: Arc<D>,
        poll_wait: Duration,
    ) -> Self {
        Self {
            id,
            db,
            storage,
            queue,
            detector,
            poll_wait,
        }
    }

    /// Run the polling loop forever.
    pub async fn run(self) {
        tracing::info!(worker = self.id, "Worker loop started");

        loop {
            match self.queue.receive(self.poll_wait).await {
                Ok(Some(message)) => self.handle(&message).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(worker = self.id, error = %e, "Queue receive failed");
                    sleep(RECEIVE_ERROR_BACKOFF).await;
                }
            }
        }
    }

    async fn handle(&self, message: &QueueMessage) {
        tracing::info!(
            worker = self.id,
            task_id = %message.task_id,
            image_key = %message.image_key,
            "Processing task"
        );

        let start = Instant::now();
        match self.process(message).await {
            Ok(labels) => {
                if let Err(e) = self.queue.acknowledge(message).await {
                    // The completion writes are idempotent, so the eventual
                    // redelivery re-converges on the same record.
                    tracing::error!(
                        task_id = %message.task_id,
                        error = %e,
                        "Failed to acknowledge message; it will be redelivered"
                    );
                }

                metrics::counter!("image_tasks_completed_total").increment(1);
                metrics::histogram!("image_task_processing_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::info!(
                    worker = self.id,
                    task_id = %message.task_id,
                    labels = ?labels,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Task completed"
                );
            }
            Err(e) => {
                // Left un-acknowledged on purpose: the visibility timeout is
                // the only retry mechanism, and the task stays Pending until
                // a later attempt succeeds.
                metrics::counter!("image_task_processing_failures_total").increment(1);
                tracing::error!(
                    worker = self.id,
                    task_id = %message.task_id,
                    error = %e,
                    "Task processing failed, leaving message for redelivery"
                );
            }
        }
    }

    /// Process one message: fetch the image, detect objects, persist the
    /// completed record and the result artifact.
    ///
    /// Does not acknowledge the message; callers do that once this returns
    /// successfully. Returns the recorded labels.
    pub async fn process(&self, message: &QueueMessage) -> Result<Vec<String>, ProcessError> {
        let image = self.storage.download(&message.image_key).await?;

        let detections = self.detector.detect(&image).await?;
        let labels = labels_above_threshold(&detections);
        let result = render_result(&labels);

        let labels_json = serde_json::to_string(&labels)?;
        let result_key = storage::result_key(message.task_id);

        queries::complete_task(&self.db, message.task_id, &labels_json, &result, &result_key)
            .await?;

        self.storage
            .upload(&result_key, result.as_bytes(), "text/plain")
            .await?;

        Ok(labels)
    }
}

/// Periodic liveness report, run as its own task so the polling loops stay
/// free of logging bookkeeping.
pub async fn heartbeat(queue: Arc<TaskQueue>) {
    let mut tick = tokio::time::interval(HEARTBEAT_PERIOD);

    loop {
        tick.tick().await;
        match queue.queue_depth().await {
            Ok(depth) => {
                metrics::gauge!("image_task_queue_depth").set(depth as f64);
                tracing::info!(depth, "Listening for queue messages");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to read queue depth"),
        }
    }
}

/// Project detections to label names: drop low-confidence hits, deduplicate
/// preserving first-seen order.
fn labels_above_threshold(detections: &[Detection]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for detection in detections {
        if detection.score > CONFIDENCE_THRESHOLD && !labels.contains(&detection.label) {
            labels.push(detection.label.clone());
        }
    }
    labels
}

/// Derive the human-readable result string from the label set.
fn render_result(labels: &[String]) -> String {
    if labels.is_empty() {
        NO_OBJECTS_SENTINEL.to_string()
    } else {
        labels.join(", ")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("Failed to encode labels: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(label: &str, score: f32) -> Detection {
        Detection {
            label: label.to_string(),
            score,
        }
    }

    #[test]
    fn drops_detections_at_or_below_the_threshold() {
        let detections = vec![
            detection("cat", 0.9),
            detection("chair", 0.2),
            detection("dog", 0.1999),
        ];
        assert_eq!(labels_above_threshold(&detections), vec!["cat"]);
    }

    #[test]
    fn deduplicates_preserving_first_seen_order() {
        let detections = vec![
            detection("dog", 0.8),
            detection("cat", 0.7),
            detection("dog", 0.95),
            detection("cat", 0.3),
        ];
        assert_eq!(labels_above_threshold(&detections), vec!["dog", "cat"]);
    }

    #[test]
    fn renders_comma_joined_labels() {
        let labels = vec!["cat".to_string(), "sofa".to_string()];
        assert_eq!(render_result(&labels), "cat, sofa");
    }

    #[test]
    fn renders_sentinel_for_empty_label_set() {
        assert_eq!(render_result(&[]), NO_OBJECTS_SENTINEL);
    }

    #[test]
    fn empty_detections_produce_the_sentinel_end_to_end() {
        let labels = labels_above_threshold(&[detection("person", 0.05)]);
        assert!(labels.is_empty());
        assert_eq!(render_result(&labels), "No objects detected");
    }
}
