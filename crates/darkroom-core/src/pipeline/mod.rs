//! The asynchronous task pipeline.
//!
//! - **images**: upload, lookup and deletion of originals
//! - **orchestrator**: request path; persists a task, then publishes its work item
//! - **worker**: processing path; drives each task through the state machine
//!
//! Components take their collaborators as trait objects and log inside the
//! `tracing::Span` they are given with `with_span`.

pub mod images;
pub mod orchestrator;
pub mod worker;

pub use images::ImageService;
pub use orchestrator::{EnqueuedTask, TaskOrchestrator};
pub use worker::{Iteration, Outcome, Worker, WorkerSettings, WorkerStats};
