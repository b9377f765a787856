//! Engine errors

use crate::task::TaskId;

/// Errors from engine handle operations
///
/// Step failures are not engine errors: they finish the task with
/// `status = error` and are reported through `TaskDone`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine driver is no longer running
    #[error("engine is closed")]
    Closed,

    /// A step signal arrived that does not belong to the in-flight step
    #[error("unexpected signal for task {task_id} step {step}: {reason}")]
    UnexpectedSignal {
        task_id: TaskId,
        step: usize,
        reason: String,
    },
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for EngineError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::Closed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for EngineError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::Closed
    }
}
