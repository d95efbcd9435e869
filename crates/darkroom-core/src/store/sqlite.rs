//! SQLite-backed task and image store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{ImageStore, TaskStore};
use crate::db::Database;
use crate::error::StoreError;
use crate::state::TaskStatus;
use crate::types::{Image, ImageId, NewTask, Task, TaskId, TaskType};

const TASK_COLUMNS: &str = "id, image_id, processed_path, type, status, attempts, created_at";

/// Raw task row; converted to [`Task`] outside the connection lock so decode
/// problems surface as [`StoreError::Corrupt`].
struct TaskRow {
    id: i64,
    image_id: String,
    processed_path: String,
    task_type: String,
    status: String,
    attempts: i64,
    created_at: String,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            image_id: row.get("image_id")?,
            processed_path: row.get("processed_path")?,
            task_type: row.get("type")?,
            status: row.get("status")?,
            attempts: row.get("attempts")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_task(self, op: &'static str) -> Result<Task, StoreError> {
        let corrupt = |message: String| StoreError::Corrupt { op, message };
        Ok(Task {
            id: TaskId::new(self.id),
            image_id: self
                .image_id
                .parse()
                .map_err(|e| corrupt(format!("image_id {:?}: {e}", self.image_id)))?,
            processed_path: self.processed_path,
            task_type: self
                .task_type
                .parse::<TaskType>()
                .map_err(|e| corrupt(e.to_string()))?,
            status: self
                .status
                .parse::<TaskStatus>()
                .map_err(|e| corrupt(e.to_string()))?,
            attempts: u32::try_from(self.attempts)
                .map_err(|_| corrupt(format!("attempts out of range: {}", self.attempts)))?,
            created_at: parse_timestamp(&self.created_at).map_err(corrupt)?,
        })
    }
}

struct ImageRow {
    id: String,
    original_path: String,
    uploaded_at: String,
}

impl ImageRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            original_path: row.get("original_path")?,
            uploaded_at: row.get("uploaded_at")?,
        })
    }

    fn into_image(self, op: &'static str) -> Result<Image, StoreError> {
        let corrupt = |message: String| StoreError::Corrupt { op, message };
        Ok(Image {
            id: self
                .id
                .parse()
                .map_err(|e| corrupt(format!("id {:?}: {e}", self.id)))?,
            path: self.original_path,
            uploaded_at: parse_timestamp(&self.uploaded_at).map_err(corrupt)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("timestamp {raw:?}: {e}"))
}

/// Task and image rows in SQLite, sharing a [`Database`] handle.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ImageStore for SqliteStore {
    async fn create_image(&self, image: &Image) -> Result<(), StoreError> {
        const OP: &str = "store.image.create";
        let (id, path, uploaded_at) = (
            image.id.to_string(),
            image.path.clone(),
            image.uploaded_at.to_rfc3339(),
        );
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO images (id, original_path, uploaded_at) VALUES (?1, ?2, ?3)",
                    params![id, path, uploaded_at],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::backend(OP, e))
    }

    async fn get_image(&self, id: ImageId) -> Result<Image, StoreError> {
        const OP: &str = "store.image.get";
        let key = id.to_string();
        let row = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT id, original_path, uploaded_at FROM images WHERE id = ?1",
                        params![key],
                        ImageRow::from_row,
                    )
                    .optional()?)
            })
            .await
            .map_err(|e| StoreError::backend(OP, e))?;

        row.ok_or_else(|| StoreError::NotFound {
            entity: "image",
            id: id.to_string(),
        })?
        .into_image(OP)
    }

    async fn delete_image(&self, id: ImageId) -> Result<(), StoreError> {
        const OP: &str = "store.image.delete";
        let key = id.to_string();
        let deleted = self
            .db
            .call(move |conn| Ok(conn.execute("DELETE FROM images WHERE id = ?1", params![key])?))
            .await
            .map_err(|e| StoreError::backend(OP, e))?;

        if deleted == 0 {
            return Err(StoreError::NotFound {
                entity: "image",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        const OP: &str = "store.task.create";
        let created_at = Utc::now();
        let (image_id, processed_path, task_type, stamp) = (
            task.image_id.to_string(),
            task.processed_path.clone(),
            task.task_type.as_str(),
            created_at.to_rfc3339(),
        );

        let id = self
            .db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tasks
                         (image_id, processed_path, type, status, attempts, created_at)
                     VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                    params![
                        image_id,
                        processed_path,
                        task_type,
                        TaskStatus::Queued.as_str(),
                        stamp
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(|e| StoreError::backend(OP, e))?;

        Ok(Task {
            id: TaskId::new(id),
            image_id: task.image_id,
            processed_path: task.processed_path,
            task_type: task.task_type,
            status: TaskStatus::Queued,
            attempts: 0,
            created_at,
        })
    }

    async fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        const OP: &str = "store.task.get";
        let row = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                        params![id.get()],
                        TaskRow::from_row,
                    )
                    .optional()?)
            })
            .await
            .map_err(|e| StoreError::backend(OP, e))?;

        row.ok_or_else(|| StoreError::NotFound {
            entity: "task",
            id: id.to_string(),
        })?
        .into_task(OP)
    }

    async fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
    ) -> Result<Task, StoreError> {
        const OP: &str = "store.task.update_status";
        let bump: i64 = if status == TaskStatus::Processing { 1 } else { 0 };
        let row = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!(
                            "UPDATE tasks SET status = ?2, attempts = attempts + ?3
                             WHERE id = ?1 RETURNING {TASK_COLUMNS}"
                        ),
                        params![id.get(), status.as_str(), bump],
                        TaskRow::from_row,
                    )
                    .optional()?)
            })
            .await
            .map_err(|e| StoreError::backend(OP, e))?;

        row.ok_or_else(|| StoreError::NotFound {
            entity: "task",
            id: id.to_string(),
        })?
        .into_task(OP)
    }

    async fn force_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        count_attempt: bool,
    ) -> Result<u32, StoreError> {
        const OP: &str = "store.task.force_status";
        let bump = i64::from(count_attempt);
        let attempts = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "UPDATE tasks SET status = ?2, attempts = attempts + ?3
                         WHERE id = ?1 AND status NOT IN (?4, ?5)
                         RETURNING attempts",
                        params![
                            id.get(),
                            status.as_str(),
                            bump,
                            TaskStatus::Completed.as_str(),
                            TaskStatus::Abandoned.as_str()
                        ],
                        |row| row.get::<_, i64>(0),
                    )
                    .optional()?)
            })
            .await
            .map_err(|e| StoreError::backend(OP, e))?
            .ok_or_else(|| StoreError::NotFound {
                entity: "task",
                id: id.to_string(),
            })?;

        u32::try_from(attempts).map_err(|_| StoreError::Corrupt {
            op: OP,
            message: format!("attempts out of range: {attempts}"),
        })
    }
}
