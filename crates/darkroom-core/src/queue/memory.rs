//! In-process broker with visibility-timeout redelivery.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::{message_key, Consumer, Message, Producer, WorkItem};
use crate::error::QueueError;
use crate::types::TaskId;

struct Entry {
    key: Vec<u8>,
    value: Vec<u8>,
    delivery_count: u32,
    visible_at: Instant,
}

struct BrokerState {
    next_offset: u64,
    /// Uncommitted messages by offset; committed ones are removed.
    entries: BTreeMap<u64, Entry>,
}

/// Single-topic, at-least-once broker held in memory.
///
/// `consume` hands out the oldest visible message and hides it for the
/// visibility timeout; if it is not committed in time it is delivered again.
pub struct MemoryBroker {
    state: Mutex<BrokerState>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl MemoryBroker {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(BrokerState {
                next_offset: 0,
                entries: BTreeMap::new(),
            }),
            notify: Notify::new(),
            visibility_timeout,
        }
    }

    /// Append a raw message; returns its offset.
    pub async fn publish(&self, key: Vec<u8>, value: Vec<u8>) -> u64 {
        let offset = {
            let mut state = self.state.lock().await;
            let offset = state.next_offset;
            state.next_offset += 1;
            state.entries.insert(
                offset,
                Entry {
                    key,
                    value,
                    delivery_count: 0,
                    visible_at: Instant::now(),
                },
            );
            offset
        };
        self.notify.notify_one();
        offset
    }

    /// Messages not yet committed, in flight or waiting.
    pub async fn pending(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Producer for MemoryBroker {
    async fn produce(&self, task_id: TaskId) -> Result<(), QueueError> {
        let value = WorkItem::new(task_id).encode()?;
        self.publish(message_key(task_id), value).await;
        Ok(())
    }
}

#[async_trait]
impl Consumer for MemoryBroker {
    async fn consume(&self) -> Result<Message, QueueError> {
        loop {
            let next_wake = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                if let Some((&offset, entry)) = state
                    .entries
                    .iter_mut()
                    .find(|(_, entry)| entry.visible_at <= now)
                {
                    entry.delivery_count += 1;
                    entry.visible_at = now + self.visibility_timeout;
                    return Ok(Message {
                        offset,
                        key: entry.key.clone(),
                        value: entry.value.clone(),
                        delivery_count: entry.delivery_count,
                    });
                }

                // Nothing visible - wake when the earliest in-flight message expires
                state.entries.values().map(|entry| entry.visible_at).min()
            };

            if let Some(wake_time) = next_wake {
                tokio::select! {
                    _ = self.notify.notified() => {},
                    _ = tokio::time::sleep_until(wake_time) => {},
                }
            } else {
                self.notify.notified().await;
            }
        }
    }

    async fn commit(&self, message: &Message) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state
            .entries
            .remove(&message.offset)
            .map(|_| ())
            .ok_or(QueueError::UnknownMessage(message.offset))
    }
}
