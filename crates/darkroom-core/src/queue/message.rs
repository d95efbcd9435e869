//! Work item wire format: `{"ID": <task id>}`.
//!
//! A bare task id as UTF-8 text is accepted on decode as well.

use serde::{Deserialize, Serialize};

use crate::error::{QueueError, WorkItemError};
use crate::types::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(rename = "ID")]
    pub task_id: TaskId,
}

impl WorkItem {
    pub fn new(task_id: TaskId) -> Self {
        Self { task_id }
    }

    pub fn encode(&self) -> Result<Vec<u8>, QueueError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, WorkItemError> {
        let json_err = match serde_json::from_slice::<WorkItem>(payload) {
            Ok(item) => return Ok(item),
            Err(e) => e,
        };

        if let Some(task_id) = std::str::from_utf8(payload)
            .ok()
            .and_then(|text| text.trim().parse::<TaskId>().ok())
        {
            return Ok(Self { task_id });
        }

        Err(WorkItemError {
            message: json_err.to_string(),
            recovered_id: salvage_id(payload),
        })
    }
}

/// Best-effort id recovery from a payload that did not decode cleanly,
/// e.g. `{"ID": "17"}` or `{"ID": 17.0, "extra": ...}` with a bad shape.
fn salvage_id(payload: &[u8]) -> Option<TaskId> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    let id = value.get("ID")?;
    if let Some(n) = id.as_i64() {
        return Some(TaskId::new(n));
    }
    if let Some(f) = id.as_f64() {
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
            return Some(TaskId::new(f as i64));
        }
    }
    id.as_str()?.trim().parse().ok()
}
