//! Error types for the Darkroom transformation pipeline.
//!
//! Errors are organized by collaborator (store, blob, queue, transform) and,
//! for the worker, by pipeline stage. Every error maps onto a small
//! [`ErrorKind`] taxonomy so callers can tell client mistakes from transient
//! infrastructure trouble without matching on every variant.

use std::path::PathBuf;
use thiserror::Error;

use crate::state::TaskStatus;
use crate::types::{ImageId, TaskId};

/// Coarse classification shared by every error in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The referenced entity does not exist.
    NotFound,
    /// The request itself is invalid.
    Validation,
    /// Storage, broker or filesystem trouble; retrying may succeed.
    TransientIo,
    /// Bytes could not be interpreted (image data, payloads, stored rows).
    Decode,
}

/// Top-level error type for Darkroom operations.
#[derive(Error, Debug)]
pub enum DarkroomError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database open or migration errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Task or image persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Blob storage errors
    #[error("Blob error: {0}")]
    Blob(#[from] BlobError),

    /// Message queue errors
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Image transformation errors
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Request-path errors
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors raised by the shared SQLite handle itself.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Blocking database task failed: {0}")]
    Join(String),
}

/// Task and image persistence errors.
///
/// "No such row" is always [`StoreError::NotFound`], never folded into a
/// backend failure.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Corrupt row in {op}: {message}")]
    Corrupt { op: &'static str, message: String },

    #[error("Backend failure in {op}: {message}")]
    Backend { op: &'static str, message: String },
}

impl StoreError {
    pub(crate) fn backend(op: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Backend {
            op,
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Corrupt { .. } => ErrorKind::Decode,
            Self::Backend { .. } => ErrorKind::TransientIo,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Blob storage errors.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob key: {0:?}")]
    InvalidKey(String),

    #[error("Blob {op} failed for {path}: {source}")]
    Io {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl BlobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidKey(_) => ErrorKind::Validation,
            Self::Io { .. } => ErrorKind::TransientIo,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Message queue errors.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Broker failure in {op}: {message}")]
    Broker { op: &'static str, message: String },

    #[error("Failed to encode work item: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("No in-flight message at offset {0}")]
    UnknownMessage(u64),
}

impl QueueError {
    pub(crate) fn broker(op: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Broker {
            op,
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Broker { .. } => ErrorKind::TransientIo,
            Self::Encode(_) => ErrorKind::Decode,
            Self::UnknownMessage(_) => ErrorKind::NotFound,
        }
    }
}

/// Image transformation errors. The input buffer is never modified.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Unknown transformation type: {0:?}")]
    UnknownType(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Image too large: {width}x{height} > {max_dim}")]
    ImageTooLarge {
        width: u32,
        height: u32,
        max_dim: u32,
    },
}

impl TransformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownType(_) | Self::ImageTooLarge { .. } => ErrorKind::Validation,
            Self::Decode(_) | Self::Encode(_) => ErrorKind::Decode,
        }
    }
}

/// A queue payload that could not be decoded into a work item.
#[derive(Error, Debug)]
#[error("Malformed work item: {message}")]
pub struct WorkItemError {
    pub message: String,
    /// Task id salvaged from the payload, if any could be found.
    pub recovered_id: Option<TaskId>,
}

/// A status change outside the task transition table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Task {task_id}: transition {from} -> {to} is not allowed")]
pub struct TransitionError {
    pub task_id: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// A stored status string that names no known status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown task status: {0:?}")]
pub struct UnknownStatus(pub String);

/// Errors surfaced to the request path (upload, enqueue, lookup, delete).
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Image {0} not found")]
    ImageNotFound(ImageId),

    #[error("Task {0} not found")]
    TaskNotFound(TaskId),

    #[error("Blob {0} not found")]
    BlobNotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Blob(BlobError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ImageNotFound(_) | Self::TaskNotFound(_) | Self::BlobNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::Validation(_) => ErrorKind::Validation,
            Self::Store(e) => e.kind(),
            Self::Blob(e) => e.kind(),
            Self::Queue(e) => e.kind(),
        }
    }

    /// Whether the caller is at fault (4xx) rather than the service (5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::Validation)
    }
}

impl From<TransformError> for ServiceError {
    fn from(err: TransformError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<BlobError> for ServiceError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(path) => Self::BlobNotFound(path),
            BlobError::InvalidKey(key) => Self::Validation(format!("invalid blob key {key:?}")),
            other => Self::Blob(other),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Worker pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to load task {task_id}: {source}")]
    LoadTask {
        task_id: TaskId,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Failed to set task {task_id} to {status}: {source}")]
    UpdateStatus {
        task_id: TaskId,
        status: TaskStatus,
        #[source]
        source: StoreError,
    },

    #[error("Failed to resolve source image {image_id} for task {task_id}: {source}")]
    ResolveSource {
        task_id: TaskId,
        image_id: ImageId,
        #[source]
        source: StoreError,
    },

    #[error("Failed to load {path} for task {task_id}: {source}")]
    LoadBlob {
        task_id: TaskId,
        path: String,
        #[source]
        source: BlobError,
    },

    #[error("Transform failed for task {task_id}: {source}")]
    Transform {
        task_id: TaskId,
        #[source]
        source: TransformError,
    },

    #[error("Transform aborted for task {task_id}: {message}")]
    Aborted { task_id: TaskId, message: String },

    #[error("Failed to save {path} for task {task_id}: {source}")]
    SaveOutput {
        task_id: TaskId,
        path: String,
        #[source]
        source: BlobError,
    },

    #[error("Timeout in {stage} stage for task {task_id} after {timeout_ms}ms")]
    Timeout {
        task_id: TaskId,
        stage: &'static str,
        timeout_ms: u64,
    },
}

impl PipelineError {
    /// Short stage name for logs and iteration outcomes.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::LoadTask { .. } => "load_task",
            Self::Transition(_) | Self::UpdateStatus { .. } => "update_status",
            Self::ResolveSource { .. } => "resolve_source",
            Self::LoadBlob { .. } => "load_blob",
            Self::Transform { .. } | Self::Aborted { .. } => "transform",
            Self::SaveOutput { .. } => "save_output",
            Self::Timeout { stage, .. } => stage,
        }
    }
}

/// Convenience type alias for Darkroom results.
pub type Result<T> = std::result::Result<T, DarkroomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_client_classification() {
        assert!(ServiceError::ImageNotFound(ImageId::new()).is_client_error());
        assert!(ServiceError::Validation("bad".into()).is_client_error());

        let backend = ServiceError::Store(StoreError::backend("store.image.get", "disk full"));
        assert!(!backend.is_client_error());
        assert_eq!(backend.kind(), ErrorKind::TransientIo);
    }

    #[test]
    fn test_blob_not_found_becomes_service_not_found() {
        let err: ServiceError = BlobError::NotFound("processed/x_resize.jpg".into()).into();
        assert!(matches!(err, ServiceError::BlobNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_pipeline_error_stage_names() {
        let err = PipelineError::Timeout {
            task_id: TaskId::new(3),
            stage: "transform",
            timeout_ms: 10,
        };
        assert_eq!(err.stage(), "transform");

        let err = PipelineError::LoadBlob {
            task_id: TaskId::new(3),
            path: "original/a.jpg".into(),
            source: BlobError::NotFound("original/a.jpg".into()),
        };
        assert_eq!(err.stage(), "load_blob");
        assert!(err.to_string().contains("original/a.jpg"));
    }
}
