//! In-memory task and image store.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use super::{ImageStore, TaskStore};
use crate::error::StoreError;
use crate::state::TaskStatus;
use crate::types::{Image, ImageId, NewTask, Task, TaskId};

struct MemoryState {
    images: HashMap<ImageId, Image>,
    tasks: BTreeMap<TaskId, Task>,
    next_task_id: i64,
}

/// Both stores over one mutex-guarded state, mirroring the relational layout
/// (tasks reference images, deleting an image removes its tasks).
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                images: HashMap::new(),
                tasks: BTreeMap::new(),
                next_task_id: 1,
            }),
        }
    }

    /// Number of task rows, for assertions.
    pub async fn task_count(&self) -> usize {
        self.state.lock().await.tasks.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn image_not_found(id: ImageId) -> StoreError {
    StoreError::NotFound {
        entity: "image",
        id: id.to_string(),
    }
}

fn task_not_found(id: TaskId) -> StoreError {
    StoreError::NotFound {
        entity: "task",
        id: id.to_string(),
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn create_image(&self, image: &Image) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.images.contains_key(&image.id) {
            return Err(StoreError::backend(
                "store.image.create",
                format!("duplicate image id {}", image.id),
            ));
        }
        state.images.insert(image.id, image.clone());
        Ok(())
    }

    async fn get_image(&self, id: ImageId) -> Result<Image, StoreError> {
        let state = self.state.lock().await;
        state.images.get(&id).cloned().ok_or_else(|| image_not_found(id))
    }

    async fn delete_image(&self, id: ImageId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.images.remove(&id).ok_or_else(|| image_not_found(id))?;
        state.tasks.retain(|_, task| task.image_id != id);
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let mut state = self.state.lock().await;
        if !state.images.contains_key(&task.image_id) {
            return Err(StoreError::backend(
                "store.task.create",
                format!("image {} does not exist", task.image_id),
            ));
        }

        let id = TaskId::new(state.next_task_id);
        state.next_task_id += 1;

        let task = Task {
            id,
            image_id: task.image_id,
            processed_path: task.processed_path,
            task_type: task.task_type,
            status: TaskStatus::Queued,
            attempts: 0,
            created_at: Utc::now(),
        };
        state.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        let state = self.state.lock().await;
        state.tasks.get(&id).cloned().ok_or_else(|| task_not_found(id))
    }

    async fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
    ) -> Result<Task, StoreError> {
        let mut state = self.state.lock().await;
        let task = state.tasks.get_mut(&id).ok_or_else(|| task_not_found(id))?;
        task.status = status;
        if status == TaskStatus::Processing {
            task.attempts += 1;
        }
        Ok(task.clone())
    }

    async fn force_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        count_attempt: bool,
    ) -> Result<u32, StoreError> {
        let mut state = self.state.lock().await;
        let task = state
            .tasks
            .get_mut(&id)
            .filter(|task| !task.status.is_terminal())
            .ok_or_else(|| task_not_found(id))?;
        task.status = status;
        if count_attempt {
            task.attempts += 1;
        }
        Ok(task.attempts)
    }
}
