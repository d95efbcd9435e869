//! Request-path entry point for transformation requests.

use std::sync::Arc;

use serde::Serialize;
use tracing::{Instrument, Span};

use crate::error::ServiceError;
use crate::paths::processed_path;
use crate::queue::Producer;
use crate::state::TaskStatus;
use crate::store::{ImageStore, TaskStore};
use crate::types::{ImageId, NewTask, Task, TaskId, TaskType};

/// What the caller gets back from a successful enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnqueuedTask {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub processed_path: String,
}

/// Creates task rows and publishes their work items. Never touches a task's
/// status after creation.
pub struct TaskOrchestrator {
    images: Arc<dyn ImageStore>,
    tasks: Arc<dyn TaskStore>,
    producer: Arc<dyn Producer>,
    span: Span,
}

impl TaskOrchestrator {
    pub fn new(
        images: Arc<dyn ImageStore>,
        tasks: Arc<dyn TaskStore>,
        producer: Arc<dyn Producer>,
    ) -> Self {
        Self {
            images,
            tasks,
            producer,
            span: Span::none(),
        }
    }

    /// Record this component's events inside `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Queue `action` for `image_id`.
    ///
    /// The task row is durable before its work item is published. If the
    /// publish fails the row stays `queued` and the error is returned.
    pub async fn enqueue_task(
        &self,
        image_id: ImageId,
        action: TaskType,
    ) -> Result<EnqueuedTask, ServiceError> {
        self.enqueue(image_id, action)
            .instrument(self.span.clone())
            .await
    }

    /// Like [`enqueue_task`](Self::enqueue_task) with the action given by name.
    pub async fn enqueue_named(
        &self,
        image_id: ImageId,
        action: &str,
    ) -> Result<EnqueuedTask, ServiceError> {
        let action: TaskType = action.parse()?;
        self.enqueue_task(image_id, action).await
    }

    pub async fn get_task(&self, task_id: TaskId) -> Result<Task, ServiceError> {
        self.tasks.get_task(task_id).await.map_err(|e| {
            if e.is_not_found() {
                ServiceError::TaskNotFound(task_id)
            } else {
                e.into()
            }
        })
    }

    async fn enqueue(
        &self,
        image_id: ImageId,
        action: TaskType,
    ) -> Result<EnqueuedTask, ServiceError> {
        let image = self.images.get_image(image_id).await.map_err(|e| {
            if e.is_not_found() {
                ServiceError::ImageNotFound(image_id)
            } else {
                e.into()
            }
        })?;

        let processed_path = processed_path(&image.path, action);
        let task = self
            .tasks
            .create_task(NewTask {
                image_id,
                processed_path: processed_path.clone(),
                task_type: action,
            })
            .await?;

        if let Err(e) = self.producer.produce(task.id).await {
            tracing::error!(
                task_id = %task.id,
                "Publish failed; task {} left queued without a work item: {}",
                task.id,
                e
            );
            return Err(e.into());
        }

        tracing::info!(
            task_id = %task.id,
            image_id = %image_id,
            "Queued {} -> {}",
            action,
            processed_path
        );
        Ok(EnqueuedTask {
            task_id: task.id,
            status: task.status,
            processed_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueueError;
    use crate::queue::{Consumer, MemoryBroker, WorkItem};
    use crate::store::MemoryStore;
    use crate::types::Image;
    use async_trait::async_trait;
    use chrono::Utc;

    struct FailingProducer;

    #[async_trait]
    impl Producer for FailingProducer {
        async fn produce(&self, _task_id: TaskId) -> Result<(), QueueError> {
            Err(QueueError::Broker {
                op: "queue.publish",
                message: "broker down".into(),
            })
        }
    }

    async fn seeded_store() -> (Arc<MemoryStore>, Image) {
        let store = Arc::new(MemoryStore::new());
        let image = Image {
            id: ImageId::new(),
            path: "original/x.jpg".into(),
            uploaded_at: Utc::now(),
        };
        store.create_image(&image).await.unwrap();
        (store, image)
    }

    #[tokio::test]
    async fn test_enqueue_persists_then_publishes() {
        let (store, image) = seeded_store().await;
        let broker = Arc::new(MemoryBroker::default());
        let orchestrator = TaskOrchestrator::new(store.clone(), store.clone(), broker.clone());

        let queued = orchestrator
            .enqueue_task(image.id, TaskType::Resize)
            .await
            .unwrap();
        assert_eq!(queued.status, TaskStatus::Queued);
        assert_eq!(queued.processed_path, "processed/x_resize.jpg");

        let task = store.get_task(queued.task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.processed_path, "processed/x_resize.jpg");

        let msg = broker.consume().await.unwrap();
        assert_eq!(WorkItem::decode(&msg.value).unwrap().task_id, queued.task_id);
    }

    #[tokio::test]
    async fn test_missing_image_creates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let broker = Arc::new(MemoryBroker::default());
        let orchestrator = TaskOrchestrator::new(store.clone(), store.clone(), broker.clone());

        let err = orchestrator
            .enqueue_task(ImageId::new(), TaskType::Thumbnail)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ImageNotFound(_)));
        assert_eq!(store.task_count().await, 0);
        assert_eq!(broker.pending().await, 0);
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_queued_row() {
        let (store, image) = seeded_store().await;
        let orchestrator =
            TaskOrchestrator::new(store.clone(), store.clone(), Arc::new(FailingProducer));

        let err = orchestrator
            .enqueue_task(image.id, TaskType::Watermark)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Queue(_)));
        assert!(!err.is_client_error());

        assert_eq!(store.task_count().await, 1);
        let orphan = store.get_task(TaskId::new(1)).await.unwrap();
        assert_eq!(orphan.status, TaskStatus::Queued);
    }

    #[tokio::test]
    async fn test_unknown_action_name_is_validation_error() {
        let (store, image) = seeded_store().await;
        let broker = Arc::new(MemoryBroker::default());
        let orchestrator = TaskOrchestrator::new(store.clone(), store.clone(), broker.clone());

        let err = orchestrator.enqueue_named(image.id, "sepia").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(store.task_count().await, 0);
        assert_eq!(broker.pending().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_requests_create_separate_tasks() {
        let (store, image) = seeded_store().await;
        let broker = Arc::new(MemoryBroker::default());
        let orchestrator = TaskOrchestrator::new(store.clone(), store.clone(), broker.clone());

        let a = orchestrator.enqueue_task(image.id, TaskType::Resize).await.unwrap();
        let b = orchestrator.enqueue_task(image.id, TaskType::Resize).await.unwrap();
        assert_ne!(a.task_id, b.task_id);
        assert_eq!(a.processed_path, b.processed_path);
        assert_eq!(broker.pending().await, 2);
    }

    #[tokio::test]
    async fn test_get_task_maps_not_found() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = TaskOrchestrator::new(
            store.clone(),
            store.clone(),
            Arc::new(MemoryBroker::default()),
        );
        let err = orchestrator.get_task(TaskId::new(5)).await.unwrap_err();
        assert!(matches!(err, ServiceError::TaskNotFound(_)));
        assert!(err.is_client_error());
    }
}
