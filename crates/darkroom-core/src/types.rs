//! Core data types for the Darkroom pipeline: images, tasks and their ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::TransformError;
use crate::state::TaskStatus;

/// Identifier of an uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(Uuid);

impl ImageId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ImageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier of a transformation task, assigned by the task store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// An uploaded original. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,

    /// Blob key of the original bytes, e.g. `original/<uuid>.jpg`
    pub path: String,

    pub uploaded_at: DateTime<Utc>,
}

/// The transformations a task can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Resize,
    Thumbnail,
    Watermark,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [TaskType::Resize, TaskType::Thumbnail, TaskType::Watermark];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Resize => "resize",
            TaskType::Thumbnail => "thumbnail",
            TaskType::Watermark => "watermark",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resize" => Ok(TaskType::Resize),
            "thumbnail" => Ok(TaskType::Thumbnail),
            "watermark" => Ok(TaskType::Watermark),
            other => Err(TransformError::UnknownType(other.to_string())),
        }
    }
}

/// One requested transformation of one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub image_id: ImageId,

    /// Fixed at creation from the image path and the task type
    pub processed_path: String,

    #[serde(rename = "type")]
    pub task_type: TaskType,

    pub status: TaskStatus,

    /// Number of times the task has entered `processing`
    pub attempts: u32,

    pub created_at: DateTime<Utc>,
}

/// Fields the caller supplies when creating a task; the store assigns the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub image_id: ImageId,
    pub processed_path: String,
    pub task_type: TaskType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_parse() {
        assert_eq!("resize".parse::<TaskType>().unwrap(), TaskType::Resize);
        assert_eq!(
            "watermark".parse::<TaskType>().unwrap(),
            TaskType::Watermark
        );
        let err = "sepia".parse::<TaskType>().unwrap_err();
        assert!(matches!(err, TransformError::UnknownType(name) if name == "sepia"));
    }

    #[test]
    fn test_task_serializes_type_field() {
        let task = Task {
            id: TaskId::new(7),
            image_id: ImageId::new(),
            processed_path: "processed/a_thumbnail.png".into(),
            task_type: TaskType::Thumbnail,
            status: TaskStatus::Queued,
            attempts: 0,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["type"], "thumbnail");
        assert_eq!(json["status"], "queued");
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn test_image_id_round_trips_through_display() {
        let id = ImageId::new();
        let parsed: ImageId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<ImageId>().is_err());
    }
}
