//! Events published by the engine

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::EngineStatus;
use crate::task::{TaskDone, TaskId};

/// Everything an observer can learn about the engine
///
/// Events are delivered to listeners in the order the engine produces them.
/// Only [`EngineEvent::TaskDone`] carries a task's outcome; the step boundary
/// events are for observability and have no control semantics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Engine status changed (published on every transition)
    StatusChanged { status: EngineStatus },

    /// Task was queued
    TaskEnqueued { id: TaskId },

    /// A step is about to be dispatched
    StepSequenceStarts {
        task_id: TaskId,

        /// Position of the step in the task's sequence
        step: usize,

        /// Arguments before the resource is prepended; absent when the
        /// previous step completed without a value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<Value>,
    },

    /// A step completed
    StepSequenceEnds {
        task_id: TaskId,

        step: usize,

        /// Value the step completed with
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },

    /// Custom event published by a running step
    StepEmitted {
        task_id: TaskId,
        step: usize,
        name: String,
        payload: Value,
    },

    /// Task finished (exactly once per task)
    TaskDone(TaskDone),
}

impl EngineEvent {
    /// Short kind name, used for listener filtering and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => event_kinds::STATUS_CHANGED,
            Self::TaskEnqueued { .. } => event_kinds::TASK_ENQUEUED,
            Self::StepSequenceStarts { .. } => event_kinds::STEP_SEQUENCE_STARTS,
            Self::StepSequenceEnds { .. } => event_kinds::STEP_SEQUENCE_ENDS,
            Self::StepEmitted { .. } => event_kinds::STEP_EMITTED,
            Self::TaskDone(_) => event_kinds::TASK_DONE,
        }
    }

    /// Task the event relates to, if any
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::StatusChanged { .. } => None,
            Self::TaskEnqueued { id } => Some(*id),
            Self::StepSequenceStarts { task_id, .. }
            | Self::StepSequenceEnds { task_id, .. }
            | Self::StepEmitted { task_id, .. } => Some(*task_id),
            Self::TaskDone(done) => Some(done.id),
        }
    }

    /// The completion payload, if this is a `TaskDone` event
    pub fn as_task_done(&self) -> Option<&TaskDone> {
        match self {
            Self::TaskDone(done) => Some(done),
            _ => None,
        }
    }
}

/// Event kind constants
pub mod event_kinds {
    pub const STATUS_CHANGED: &str = "status_changed";
    pub const TASK_ENQUEUED: &str = "task_enqueued";
    pub const STEP_SEQUENCE_STARTS: &str = "step_sequence_starts";
    pub const STEP_SEQUENCE_ENDS: &str = "step_sequence_ends";
    pub const STEP_EMITTED: &str = "step_emitted";
    pub const TASK_DONE: &str = "task_done";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_matches_serialized_tag() {
        let id = TaskId::new();
        let events = vec![
            EngineEvent::StatusChanged {
                status: EngineStatus::Off,
            },
            EngineEvent::TaskEnqueued { id },
            EngineEvent::StepSequenceStarts {
                task_id: id,
                step: 0,
                arguments: Some(json!([10])),
            },
            EngineEvent::StepSequenceEnds {
                task_id: id,
                step: 0,
                result: Some(json!(20)),
            },
            EngineEvent::StepEmitted {
                task_id: id,
                step: 0,
                name: "progress".into(),
                payload: json!({}),
            },
            EngineEvent::TaskDone(TaskDone::stopped(id)),
        ];

        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.kind());
        }
    }

    #[test]
    fn test_status_changed_serialization() {
        let event = EngineEvent::StatusChanged {
            status: EngineStatus::WaitingToRunTask,
        };
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value, json!({"type": "status_changed", "status": "waiting-to-run-task"}));
    }

    #[test]
    fn test_starts_without_arguments_omits_field() {
        let event = EngineEvent::StepSequenceStarts {
            task_id: TaskId::new(),
            step: 1,
            arguments: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("arguments").is_none());

        let parsed: EngineEvent = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_task_id_accessor() {
        let id = TaskId::new();
        assert_eq!(EngineEvent::TaskEnqueued { id }.task_id(), Some(id));
        assert_eq!(
            EngineEvent::StatusChanged {
                status: EngineStatus::Off
            }
            .task_id(),
            None
        );
        assert!(EngineEvent::TaskDone(TaskDone::stopped(id))
            .as_task_done()
            .is_some());
    }
}
