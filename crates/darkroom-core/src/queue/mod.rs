//! Work queue between the request path and the worker.
//!
//! Delivery is at-least-once: a consumed message stays owned by the broker
//! until it is committed, and becomes visible again once its visibility
//! timeout lapses.

mod memory;
mod message;
mod sqlite;

pub use memory::MemoryBroker;
pub use message::WorkItem;
pub use sqlite::SqliteQueue;

use async_trait::async_trait;

use crate::error::QueueError;
use crate::types::TaskId;

/// One delivery of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Broker position; identifies the message for `commit`
    pub offset: u64,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// 1 on first delivery, incremented on every redelivery
    pub delivery_count: u32,
}

#[async_trait]
pub trait Producer: Send + Sync {
    /// Publish one work item for `task_id`.
    async fn produce(&self, task_id: TaskId) -> Result<(), QueueError>;
}

#[async_trait]
pub trait Consumer: Send + Sync {
    /// Wait for the next uncommitted message. Errors only on broker failure.
    async fn consume(&self) -> Result<Message, QueueError>;

    /// Acknowledge exactly `message`; it will not be delivered again.
    async fn commit(&self, message: &Message) -> Result<(), QueueError>;
}

/// Wire key for a task's work item.
pub(crate) fn message_key(task_id: TaskId) -> Vec<u8> {
    task_id.to_string().into_bytes()
}
