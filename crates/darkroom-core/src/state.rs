//! Task status and the transition table the worker is held to.
//!
//! ```text
//! queued ──▶ processing ──▶ completed
//!    │          │   ▲
//!    │          ▼   │
//!    └──────▶ failed ──▶ abandoned
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{TransitionError, UnknownStatus};
use crate::types::TaskId;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    /// Attempt budget spent; never retried again.
    Abandoned,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Abandoned)
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Queued, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Processing)
                | (Failed, Abandoned)
        )
    }

    /// Check `self -> next` against the table, returning `next` when allowed.
    pub fn transition(
        &self,
        task_id: TaskId,
        next: TaskStatus,
    ) -> Result<TaskStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                task_id,
                from: *self,
                to: next,
            })
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "abandoned" => Ok(TaskStatus::Abandoned),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::*;

    const ALL: [TaskStatus; 5] = [Queued, Processing, Completed, Failed, Abandoned];

    #[test]
    fn test_allowed_transitions() {
        let id = TaskId::new(1);
        assert_eq!(Queued.transition(id, Processing), Ok(Processing));
        assert_eq!(Processing.transition(id, Completed), Ok(Completed));
        assert_eq!(Processing.transition(id, Failed), Ok(Failed));
        assert_eq!(Failed.transition(id, Processing), Ok(Processing));
        assert_eq!(Failed.transition(id, Abandoned), Ok(Abandoned));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in [Completed, Abandoned] {
            assert!(from.is_terminal());
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_rejected_transition_reports_both_ends() {
        let err = Queued.transition(TaskId::new(9), Completed).unwrap_err();
        assert_eq!(err.from, Queued);
        assert_eq!(err.to, Completed);
        assert!(err.to_string().contains("queued -> completed"));
    }

    #[test]
    fn test_no_self_transitions() {
        for status in ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_status_parse() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>(), Ok(status));
        }
        assert!("done".parse::<TaskStatus>().is_err());
    }
}
