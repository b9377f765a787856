//! Task identity and completion payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::step::StepError;

/// Unique identifier of a submitted task
///
/// Generated at submission time (UUID v7, so ids sort by submission order)
/// and stable for the task's lifetime. Used to correlate a submission with
/// its [`TaskDone`] event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh task id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Final status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Every step completed (or a step terminated the sequence early)
    Ok,

    /// The engine was switched off before the next step could be dispatched
    Stopped,

    /// A step signalled failure
    Error,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Completion payload, published exactly once per task
///
/// `results` is only ever set when `status == Ok`, and `error` only when
/// `status == Error`. The constructors are the only way the engine builds
/// this value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDone {
    /// Task id returned by `submit`
    pub id: TaskId,

    /// Final status
    pub status: TaskStatus,

    /// Value reported by the last completed step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,

    /// Failure signalled by a step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,

    /// When the task was finalized
    pub finished_at: DateTime<Utc>,
}

impl TaskDone {
    pub(crate) fn ok(id: TaskId, results: Option<serde_json::Value>) -> Self {
        Self {
            id,
            status: TaskStatus::Ok,
            results,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub(crate) fn stopped(id: TaskId) -> Self {
        Self {
            id,
            status: TaskStatus::Stopped,
            results: None,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub(crate) fn failed(id: TaskId, error: StepError) -> Self {
        Self {
            id,
            status: TaskStatus::Error,
            results: None,
            error: Some(error),
            finished_at: Utc::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == TaskStatus::Ok
    }

    pub fn is_stopped(&self) -> bool {
        self.status == TaskStatus::Stopped
    }

    pub fn is_error(&self) -> bool {
        self.status == TaskStatus::Error
    }

    /// Convert into a `Result`, splitting step failures from the other outcomes
    pub fn into_result(self) -> Result<TaskOutcome, StepError> {
        match self.status {
            TaskStatus::Ok => Ok(TaskOutcome::Completed(self.results)),
            TaskStatus::Stopped => Ok(TaskOutcome::Stopped),
            TaskStatus::Error => Err(self
                .error
                .unwrap_or_else(|| StepError::new("task failed without an error value"))),
        }
    }
}

/// Non-failing outcome of a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Task ran to the end; carries the final results, if any
    Completed(Option<serde_json::Value>),

    /// Task was stopped by the engine switching off
    Stopped,
}

impl TaskOutcome {
    /// Final results, if the task completed with any
    pub fn results(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Completed(results) => results.as_ref(),
            Self::Stopped => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_ids_are_unique_and_ordered() {
        let first = TaskId::new();
        let second = TaskId::new();

        assert_ne!(first, second);
        assert!(first < second);
    }

    #[test]
    fn test_task_status_display() {
        assert_eq!(TaskStatus::Ok.to_string(), "ok");
        assert_eq!(TaskStatus::Stopped.to_string(), "stopped");
        assert_eq!(TaskStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_results_and_error_are_exclusive() {
        let id = TaskId::new();

        let ok = TaskDone::ok(id, Some(json!(80)));
        assert!(ok.is_ok());
        assert!(ok.error.is_none());

        let failed = TaskDone::failed(id, StepError::new("boom"));
        assert!(failed.is_error());
        assert!(failed.results.is_none());

        let stopped = TaskDone::stopped(id);
        assert!(stopped.is_stopped());
        assert!(stopped.results.is_none());
        assert!(stopped.error.is_none());
    }

    #[test]
    fn test_into_result() {
        let id = TaskId::new();

        assert_eq!(
            TaskDone::ok(id, Some(json!([1, 2]))).into_result().unwrap(),
            TaskOutcome::Completed(Some(json!([1, 2])))
        );
        assert_eq!(
            TaskDone::stopped(id).into_result().unwrap(),
            TaskOutcome::Stopped
        );

        let error = TaskDone::failed(id, StepError::new("Aborted"))
            .into_result()
            .unwrap_err();
        assert_eq!(error.message, "Aborted");
    }

    #[test]
    fn test_task_done_serialization_omits_empty_fields() {
        let done = TaskDone::stopped(TaskId::new());
        let value = serde_json::to_value(&done).unwrap();

        assert_eq!(value["status"], "stopped");
        assert!(value.get("results").is_none());
        assert!(value.get("error").is_none());

        let parsed: TaskDone = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, done);
    }
}
