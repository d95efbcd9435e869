//! Processing path: a single sequential consumer that takes each work item
//! through `queued -> processing -> completed | failed`.
//!
//! A message is committed only once its task is `completed` (or `abandoned`
//! after exhausting its attempt budget). Every other outcome leaves the
//! message uncommitted so the broker delivers it again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{Instrument, Span};

use crate::blob::{read_all, BlobStore};
use crate::config::Config;
use crate::error::PipelineError;
use crate::queue::{Consumer, Message, WorkItem};
use crate::state::TaskStatus;
use crate::store::{ImageStore, TaskStore};
use crate::transform::Transformer;
use crate::types::{Task, TaskId, TaskType};

/// Tunables for the worker loop.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Attempts before a task is abandoned; 0 retries forever
    pub max_attempts: u32,
    pub consume_retry_delay: Duration,
    pub transform_timeout: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.worker.max_attempts,
            consume_retry_delay: Duration::from_millis(config.worker.consume_retry_delay_ms),
            transform_timeout: Duration::from_millis(config.limits.transform_timeout_ms),
        }
    }

    fn budget_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts > 0 && attempts >= self.max_attempts
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// How one message was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed { stage: &'static str },
    Abandoned,
    /// Payload did not decode into a work item
    Malformed,
    /// Redelivery of a task that had already finished
    AlreadyTerminal(TaskStatus),
}

/// Result of handling a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iteration {
    pub offset: u64,
    pub task_id: Option<TaskId>,
    pub outcome: Outcome,
    pub committed: bool,
}

/// Running totals for one `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub completed: u64,
    pub failed: u64,
    pub abandoned: u64,
    pub malformed: u64,
    pub skipped: u64,
    pub consume_errors: u64,
}

impl WorkerStats {
    fn record(&mut self, iteration: &Iteration) {
        match iteration.outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::Abandoned => self.abandoned += 1,
            Outcome::Malformed => self.malformed += 1,
            Outcome::AlreadyTerminal(_) => self.skipped += 1,
        }
    }
}

enum Disposition {
    Completed,
    Abandoned,
    AlreadyTerminal(TaskStatus),
}

pub struct Worker {
    tasks: Arc<dyn TaskStore>,
    images: Arc<dyn ImageStore>,
    blobs: Arc<dyn BlobStore>,
    transformer: Arc<dyn Transformer>,
    consumer: Arc<dyn Consumer>,
    settings: WorkerSettings,
    span: Span,
}

impl Worker {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        images: Arc<dyn ImageStore>,
        blobs: Arc<dyn BlobStore>,
        transformer: Arc<dyn Transformer>,
        consumer: Arc<dyn Consumer>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            tasks,
            images,
            blobs,
            transformer,
            consumer,
            settings,
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Consume and handle messages until `shutdown` flips to `true` (or its
    /// sender is dropped). Shutdown is only observed while waiting for a
    /// message; an iteration in progress always runs to completion.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> WorkerStats {
        self.run_loop(shutdown).instrument(self.span.clone()).await
    }

    /// Handle a single delivered message.
    pub async fn handle(&self, message: &Message) -> Iteration {
        self.handle_message(message)
            .instrument(self.span.clone())
            .await
    }

    async fn run_loop(&self, mut shutdown: watch::Receiver<bool>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        tracing::info!("Worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let fetched = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                fetched = self.consumer.consume() => fetched,
            };

            match fetched {
                Ok(message) => {
                    let iteration = self.handle_message(&message).await;
                    stats.record(&iteration);
                }
                Err(e) => {
                    stats.consume_errors += 1;
                    tracing::warn!(
                        "Fetch failed, retrying in {:?}: {}",
                        self.settings.consume_retry_delay,
                        e
                    );
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(self.settings.consume_retry_delay) => {}
                    }
                }
            }
        }

        tracing::info!(
            "Worker stopped: {} completed, {} failed, {} abandoned, {} malformed",
            stats.completed,
            stats.failed,
            stats.abandoned,
            stats.malformed
        );
        stats
    }

    async fn handle_message(&self, message: &Message) -> Iteration {
        let offset = message.offset;
        let item = match WorkItem::decode(&message.value) {
            Ok(item) => item,
            Err(err) => {
                tracing::warn!(offset, "Skipping message: {}", err);
                if let Some(task_id) = err.recovered_id {
                    self.record_failure(task_id).await;
                }
                return Iteration {
                    offset,
                    task_id: err.recovered_id,
                    outcome: Outcome::Malformed,
                    committed: false,
                };
            }
        };

        let task_id = item.task_id;
        let start = Instant::now();
        let (outcome, commit) = match self.process(task_id).await {
            Ok(Disposition::Completed) => {
                tracing::info!(
                    task_id = %task_id,
                    "Task {} completed in {:?}",
                    task_id,
                    start.elapsed()
                );
                (Outcome::Completed, true)
            }
            Ok(Disposition::Abandoned) => (Outcome::Abandoned, true),
            Ok(Disposition::AlreadyTerminal(status)) => {
                tracing::debug!("Task {} redelivered after reaching {}", task_id, status);
                (Outcome::AlreadyTerminal(status), true)
            }
            Err(err) => {
                let stage = err.stage();
                tracing::error!(task_id = %task_id, stage, "{}", err);
                self.fail(task_id, &err).await
            }
        };

        let committed = commit && self.commit(message, task_id).await;
        Iteration {
            offset,
            task_id: Some(task_id),
            outcome,
            committed,
        }
    }

    async fn process(&self, task_id: TaskId) -> Result<Disposition, PipelineError> {
        let mut task = self
            .tasks
            .get_task(task_id)
            .await
            .map_err(|source| PipelineError::LoadTask { task_id, source })?;

        if task.status.is_terminal() {
            return Ok(Disposition::AlreadyTerminal(task.status));
        }

        if task.status == TaskStatus::Processing {
            tracing::warn!("Task {} was left processing by an earlier attempt", task_id);
            task = self.set_status(&task, TaskStatus::Failed).await?;
        }

        if task.status == TaskStatus::Failed && self.settings.budget_exhausted(task.attempts) {
            self.abandon(task_id, task.attempts).await?;
            return Ok(Disposition::Abandoned);
        }

        let task = self.set_status(&task, TaskStatus::Processing).await?;
        tracing::debug!(
            "Task {} attempt {}: {} -> {}",
            task_id,
            task.attempts,
            task.task_type,
            task.processed_path
        );

        self.execute(&task).await?;
        self.set_status(&task, TaskStatus::Completed).await?;
        Ok(Disposition::Completed)
    }

    /// Resolve, load, transform and store the output of a `processing` task.
    async fn execute(&self, task: &Task) -> Result<(), PipelineError> {
        let task_id = task.id;

        let image = self
            .images
            .get_image(task.image_id)
            .await
            .map_err(|source| PipelineError::ResolveSource {
                task_id,
                image_id: task.image_id,
                source,
            })?;

        let load_start = Instant::now();
        let load_err = |source| PipelineError::LoadBlob {
            task_id,
            path: image.path.clone(),
            source,
        };
        let input = {
            let mut stream = self.blobs.load(&image.path).await.map_err(load_err)?;
            read_all(&mut stream, &image.path).await.map_err(load_err)?
        };
        tracing::trace!("  Load: {:?}", load_start.elapsed());

        let transform_start = Instant::now();
        let output = self.run_transform(task_id, input, task.task_type).await?;
        tracing::trace!("  Transform: {:?}", transform_start.elapsed());

        self.blobs
            .save(&task.processed_path, &output)
            .await
            .map_err(|source| PipelineError::SaveOutput {
                task_id,
                path: task.processed_path.clone(),
                source,
            })
    }

    async fn run_transform(
        &self,
        task_id: TaskId,
        input: Vec<u8>,
        task_type: TaskType,
    ) -> Result<Vec<u8>, PipelineError> {
        let transformer = Arc::clone(&self.transformer);
        let timeout = self.settings.transform_timeout;

        let result = tokio::time::timeout(timeout, async {
            tokio::task::spawn_blocking(move || transformer.transform(&input, task_type)).await
        })
        .await;

        match result {
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(source))) => Err(PipelineError::Transform { task_id, source }),
            Ok(Err(e)) => Err(PipelineError::Aborted {
                task_id,
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Timeout {
                task_id,
                stage: "transform",
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Check the move against the transition table, then persist it.
    async fn set_status(&self, task: &Task, to: TaskStatus) -> Result<Task, PipelineError> {
        task.status.transition(task.id, to)?;
        self.tasks
            .update_task_status(task.id, to)
            .await
            .map_err(|source| PipelineError::UpdateStatus {
                task_id: task.id,
                status: to,
                source,
            })
    }

    /// Move a `failed` task to `abandoned`. Written status-only so rows that
    /// no longer decode can be retired too.
    async fn abandon(&self, task_id: TaskId, attempts: u32) -> Result<(), PipelineError> {
        let to = TaskStatus::Failed.transition(task_id, TaskStatus::Abandoned)?;
        self.tasks
            .force_status(task_id, to, false)
            .await
            .map_err(|source| PipelineError::UpdateStatus {
                task_id,
                status: to,
                source,
            })?;
        tracing::warn!(
            task_id = %task_id,
            "Task {} abandoned after {} attempts",
            task_id,
            attempts
        );
        Ok(())
    }

    /// Record a failed iteration. Returns the outcome and whether the message
    /// should be committed (only when the task was abandoned).
    async fn fail(&self, task_id: TaskId, err: &PipelineError) -> (Outcome, bool) {
        let failed = Outcome::Failed { stage: err.stage() };

        // No row to mark.
        if let PipelineError::LoadTask { source, .. } = err {
            if source.is_not_found() {
                return (failed, false);
            }
        }

        let Some(attempts) = self.record_failure(task_id).await else {
            return (failed, false);
        };
        if !self.settings.budget_exhausted(attempts) {
            return (failed, false);
        }
        match self.abandon(task_id, attempts).await {
            Ok(()) => (Outcome::Abandoned, true),
            Err(e) => {
                tracing::warn!("Could not abandon task {}: {}", task_id, e);
                (failed, false)
            }
        }
    }

    /// Best-effort move to `failed`, returning the attempt count. Logs and
    /// returns `None` if it cannot.
    ///
    /// A row that exists but does not decode is marked without being read,
    /// and that delivery counts as an attempt.
    async fn record_failure(&self, task_id: TaskId) -> Option<u32> {
        let task = match self.tasks.get_task(task_id).await {
            Ok(task) => task,
            Err(e) if e.is_not_found() => {
                tracing::warn!("Could not record failure of task {}: {}", task_id, e);
                return None;
            }
            Err(e) => {
                tracing::warn!("Task {} could not be loaded ({}); marking it failed", task_id, e);
                return match self.tasks.force_status(task_id, TaskStatus::Failed, true).await {
                    Ok(attempts) => Some(attempts),
                    Err(e) => {
                        tracing::warn!("Could not record failure of task {}: {}", task_id, e);
                        None
                    }
                };
            }
        };
        match self.set_status(&task, TaskStatus::Failed).await {
            Ok(task) => Some(task.attempts),
            Err(e) => {
                tracing::warn!("Could not record failure of task {}: {}", task_id, e);
                None
            }
        }
    }

    async fn commit(&self, message: &Message, task_id: TaskId) -> bool {
        match self.consumer.commit(message).await {
            Ok(()) => true,
            Err(e) => {
                // The task keeps its final status; redelivery is skipped as terminal.
                tracing::warn!(
                    "Commit of offset {} for task {} failed: {}",
                    message.offset,
                    task_id,
                    e
                );
                false
            }
        }
    }
}
