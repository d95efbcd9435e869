//! Task and image persistence.
//!
//! Plain storage with no transition logic; the worker decides which status a
//! task may move to and the store records it.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::state::TaskStatus;
use crate::types::{Image, ImageId, NewTask, Task, TaskId};

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn create_image(&self, image: &Image) -> Result<(), StoreError>;

    async fn get_image(&self, id: ImageId) -> Result<Image, StoreError>;

    /// Remove the image row together with every task that references it.
    async fn delete_image(&self, id: ImageId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new task in `queued` with zero attempts.
    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError>;

    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError>;

    /// Set the status and return the updated row. Entering `processing` also
    /// bumps `attempts` in the same write.
    async fn update_task_status(&self, id: TaskId, status: TaskStatus)
        -> Result<Task, StoreError>;

    /// Status-only write that never decodes the row, for tasks that cannot
    /// be loaded. Leaves `completed` and `abandoned` rows alone (`NotFound`).
    /// Bumps `attempts` when `count_attempt` is set; returns the new count.
    async fn force_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        count_attempt: bool,
    ) -> Result<u32, StoreError>;
}
