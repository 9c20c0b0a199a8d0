use std::time::Duration;

use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PENDING_KEY: &str = "image_tasks:pending";
const IN_FLIGHT_KEY: &str = "image_tasks:in_flight";
const DEADLINE_KEY: &str = "image_tasks:deadlines";

/// Message linking a task to its stored image, serialized into Redis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueMessage {
    pub task_id: Uuid,
    pub image_key: String,
}

/// Redis-backed task queue with at-least-once delivery.
///
/// A received message is moved to an in-flight list and given a redelivery
/// deadline. If it is not acknowledged before the deadline passes, the next
/// `receive` call moves it back to the pending list, where any consumer can
/// pick it up again. Consumers must therefore tolerate duplicate delivery.
pub struct TaskQueue {
    client: redis::Client,
    visibility_timeout: Duration,
}

impl TaskQueue {
    pub fn new(redis_url: &str, visibility_timeout: Duration) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            visibility_timeout,
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, QueueError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Enqueue a processing message.
    pub async fn enqueue(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(message)?;
        conn.lpush::<_, _, ()>(PENDING_KEY, &payload).await?;
        Ok(())
    }

    /// Receive the next message, blocking up to `max_wait`.
    ///
    /// Returns `None` when the queue stayed empty for the whole wait. The
    /// returned message is invisible to other consumers until its visibility
    /// window expires or it is acknowledged.
    pub async fn receive(&self, max_wait: Duration) -> Result<Option<QueueMessage>, QueueError> {
        let mut conn = self.connection().await?;
        self.requeue_expired(&mut conn).await?;

        let payload: Option<String> = conn
            .brpoplpush(PENDING_KEY, IN_FLIGHT_KEY, max_wait.as_secs_f64())
            .await?;

        match payload {
            Some(payload) => {
                let deadline = Utc::now().timestamp() + self.visibility_timeout.as_secs() as i64;
                conn.zadd::<_, _, _, ()>(DEADLINE_KEY, &payload, deadline).await?;
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }

    /// Acknowledge a processed message, removing it from the queue for good.
    pub async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(message)?;
        conn.lrem::<_, _, ()>(IN_FLIGHT_KEY, 1, &payload).await?;
        conn.zrem::<_, _, ()>(DEADLINE_KEY, &payload).await?;
        Ok(())
    }

    /// Move in-flight messages whose visibility window has expired back to
    /// the pending list.
    async fn requeue_expired(&self, conn: &mut MultiplexedConnection) -> Result<(), QueueError> {
        let now = Utc::now().timestamp();
        let expired: Vec<String> = conn.zrangebyscore(DEADLINE_KEY, "-inf", now).await?;

        for payload in expired {
            // Whoever removes the deadline entry owns the requeue; concurrent
            // sweepers see 0 here and skip.
            let removed: i64 = conn.zrem(DEADLINE_KEY, &payload).await?;
            if removed == 0 {
                continue;
            }
            conn.lrem::<_, _, ()>(IN_FLIGHT_KEY, 1, &payload).await?;
            conn.lpush::<_, _, ()>(PENDING_KEY, &payload).await?;
            tracing::warn!(payload = %payload, "Visibility window expired, message requeued");
        }

        Ok(())
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Number of messages waiting to be received.
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.connection().await?;
        let depth: u64 = conn.llen(PENDING_KEY).await?;
        Ok(depth)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_to_the_wire_schema() {
        let message = QueueMessage {
            task_id: Uuid::nil(),
            image_key: "images/00000000-0000-0000-0000-000000000000.jpg".to_string(),
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "TaskId": "00000000-0000-0000-0000-000000000000",
                "ImageKey": "images/00000000-0000-0000-0000-000000000000.jpg",
            })
        );
    }

    #[test]
    fn message_round_trips_through_json() {
        let message = QueueMessage {
            task_id: Uuid::new_v4(),
            image_key: format!("images/{}.png", Uuid::new_v4()),
        };

        let payload = serde_json::to_string(&message).unwrap();
        let parsed: QueueMessage = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed, message);
    }
}
