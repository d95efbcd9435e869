//! Darkroom Core - asynchronous image transformation pipeline.
//!
//! Clients upload originals and request transformations (resize, thumbnail,
//! watermark). A request is persisted as a task and published to a work
//! queue; a worker later consumes it, runs the transformation and records the
//! outcome.
//!
//! # Architecture
//!
//! ```text
//! enqueue -> TaskStore (queued) -> Producer ──> Consumer -> Worker
//!                                                  │
//!                     processing -> Transformer -> BlobStore -> completed | failed
//! ```
//!
//! Every collaborator sits behind a trait ([`store::TaskStore`],
//! [`blob::BlobStore`], [`queue::Producer`], [`queue::Consumer`],
//! [`transform::Transformer`]) so tests run on the in-memory adapters.
//!
//! # Usage
//!
//! ```rust,ignore
//! use darkroom_core::{Config, Darkroom, TaskType};
//!
//! #[tokio::main]
//! async fn main() -> darkroom_core::Result<()> {
//!     let darkroom = Darkroom::open(Config::load()?)?;
//!
//!     let image = darkroom.images().upload(&std::fs::read("cat.jpg")?, ".jpg").await?;
//!     let task = darkroom.orchestrator().enqueue_task(image.id, TaskType::Thumbnail).await?;
//!     println!("Queued task {}", task.task_id);
//!     Ok(())
//! }
//! ```

pub mod blob;
pub mod config;
pub mod db;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod queue;
pub mod state;
pub mod store;
pub mod transform;
pub mod types;

use std::sync::Arc;

pub use config::Config;
pub use error::{DarkroomError, ErrorKind, PipelineError, Result, ServiceError};
pub use pipeline::{
    EnqueuedTask, ImageService, Iteration, Outcome, TaskOrchestrator, Worker, WorkerSettings,
    WorkerStats,
};
pub use state::TaskStatus;
pub use types::{Image, ImageId, Task, TaskId, TaskType};

use blob::FsBlobStore;
use db::Database;
use queue::SqliteQueue;
use store::SqliteStore;
use transform::ImageTransformer;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The pipeline wired onto its durable adapters: SQLite for tasks, images and
/// the queue, the filesystem for blobs.
pub struct Darkroom {
    config: Config,
    store: Arc<SqliteStore>,
    blobs: Arc<FsBlobStore>,
    queue: Arc<SqliteQueue>,
    transformer: Arc<ImageTransformer>,
}

impl Darkroom {
    /// Validate `config` and open (creating if needed) the database and blob root.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        tracing::debug!("Initializing Darkroom v{}", VERSION);

        let database_path = config.database_path();
        let db = Database::open(&database_path)?;
        tracing::debug!("Database: {:?}", database_path);

        let blob_root = config.blob_root();
        std::fs::create_dir_all(&blob_root)?;
        tracing::debug!("Blob root: {:?}", blob_root);

        Ok(Self {
            store: Arc::new(SqliteStore::new(db.clone())),
            blobs: Arc::new(FsBlobStore::new(blob_root)),
            queue: Arc::new(SqliteQueue::new(db, &config.queue)),
            transformer: Arc::new(ImageTransformer::new(
                config.transform.clone(),
                &config.limits,
            )),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &SqliteQueue {
        &self.queue
    }

    pub fn images(&self) -> ImageService {
        ImageService::new(
            self.store.clone(),
            self.blobs.clone(),
            self.config.limits.max_upload_bytes(),
        )
        .with_span(tracing::info_span!("images"))
    }

    pub fn orchestrator(&self) -> TaskOrchestrator {
        TaskOrchestrator::new(self.store.clone(), self.store.clone(), self.queue.clone())
            .with_span(tracing::info_span!("orchestrator"))
    }

    pub fn worker(&self) -> Worker {
        Worker::new(
            self.store.clone(),
            self.store.clone(),
            self.blobs.clone(),
            self.transformer.clone(),
            self.queue.clone(),
            WorkerSettings::from_config(&self.config),
        )
        .with_span(tracing::info_span!("worker", topic = %self.config.queue.topic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::test_support::png;
    use std::time::Duration;
    use tokio::sync::watch;

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.general.data_dir = dir.to_path_buf();
        config.transform.width = 32;
        config.transform.height = 32;
        config.queue.poll_interval_ms = 10;
        config
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.transform.jpeg_quality = 0;
        assert!(matches!(
            Darkroom::open(config),
            Err(DarkroomError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_enqueue_and_work_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let darkroom = Darkroom::open(config_in(dir.path())).unwrap();
        assert!(dir.path().join("darkroom.db").exists());

        let image = darkroom.images().upload(&png(64, 64), ".png").await.unwrap();
        let queued = darkroom
            .orchestrator()
            .enqueue_named(image.id, "thumbnail")
            .await
            .unwrap();
        assert_eq!(darkroom.queue().pending().await.unwrap(), 1);

        let worker = Arc::new(darkroom.worker());
        let (tx, rx) = watch::channel(false);
        let handle = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run(rx).await })
        };

        let orchestrator = darkroom.orchestrator();
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while orchestrator.get_task(queued.task_id).await.unwrap().status != TaskStatus::Completed
        {
            assert!(std::time::Instant::now() < deadline, "task never completed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(true).unwrap();
        let stats = handle.await.unwrap();
        assert_eq!(stats.completed, 1);

        let output = dir.path().join("blobs").join(&queued.processed_path);
        let thumb = ::image::load_from_memory(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (3, 3));
        assert_eq!(darkroom.queue().pending().await.unwrap(), 0);
    }
}
