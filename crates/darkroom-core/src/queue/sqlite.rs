//! Durable broker on the `queue_messages` table.
//!
//! Lets separate processes share one queue: the CLI enqueues, a long-running
//! worker consumes. Claiming a message is a single `UPDATE ... RETURNING`, so
//! two consumers never receive the same delivery. Committing deletes the row.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{message_key, Consumer, Message, Producer, WorkItem};
use crate::config::QueueConfig;
use crate::db::Database;
use crate::error::QueueError;
use crate::types::TaskId;

pub struct SqliteQueue {
    db: Database,
    topic: String,
    poll_interval: Duration,
    visibility_timeout: Duration,
}

impl SqliteQueue {
    pub fn new(db: Database, config: &QueueConfig) -> Self {
        Self {
            db,
            topic: config.topic.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            visibility_timeout: Duration::from_millis(config.visibility_timeout_ms),
        }
    }

    /// Append a raw message to the topic; returns its offset.
    pub async fn publish(&self, key: Vec<u8>, value: Vec<u8>) -> Result<u64, QueueError> {
        let topic = self.topic.clone();
        let now = now_ms();
        let offset = self
            .db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO queue_messages (topic, key, value, delivery_count, visible_at)
                     VALUES (?1, ?2, ?3, 0, ?4)",
                    params![topic, key, value, now],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(|e| QueueError::broker("queue.publish", e))?;
        Ok(offset as u64)
    }

    /// Claim the oldest visible message, if any, without waiting.
    pub async fn try_consume(&self) -> Result<Option<Message>, QueueError> {
        let topic = self.topic.clone();
        let now = now_ms();
        let hidden_until = now.saturating_add(self.visibility_timeout.as_millis() as i64);
        self.db
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "UPDATE queue_messages
                         SET delivery_count = delivery_count + 1, visible_at = ?3
                         WHERE id = (
                             SELECT id FROM queue_messages
                             WHERE topic = ?1 AND visible_at <= ?2
                             ORDER BY id LIMIT 1
                         )
                         RETURNING id, key, value, delivery_count",
                        params![topic, now, hidden_until],
                        |row| {
                            Ok(Message {
                                offset: row.get::<_, i64>("id")? as u64,
                                key: row.get("key")?,
                                value: row.get("value")?,
                                delivery_count: row.get("delivery_count")?,
                            })
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(|e| QueueError::broker("queue.consume", e))
    }

    /// Messages on the topic that have not been committed.
    pub async fn pending(&self) -> Result<u64, QueueError> {
        let topic = self.topic.clone();
        self.db
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM queue_messages WHERE topic = ?1",
                    params![topic],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(|e| QueueError::broker("queue.pending", e))
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl Producer for SqliteQueue {
    async fn produce(&self, task_id: TaskId) -> Result<(), QueueError> {
        let value = WorkItem::new(task_id).encode()?;
        let offset = self.publish(message_key(task_id), value).await?;
        tracing::debug!("Published task {} at offset {}", task_id, offset);
        Ok(())
    }
}

#[async_trait]
impl Consumer for SqliteQueue {
    async fn consume(&self) -> Result<Message, QueueError> {
        loop {
            if let Some(message) = self.try_consume().await? {
                return Ok(message);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn commit(&self, message: &Message) -> Result<(), QueueError> {
        let topic = self.topic.clone();
        let offset = message.offset;
        let deleted = self
            .db
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM queue_messages WHERE id = ?1 AND topic = ?2",
                    params![offset as i64, topic],
                )?)
            })
            .await
            .map_err(|e| QueueError::broker("queue.commit", e))?;

        if deleted == 0 {
            return Err(QueueError::UnknownMessage(offset));
        }
        Ok(())
    }
}
