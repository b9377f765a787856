//! Single-use resumption handle given to every dispatched step

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::StepError;
use crate::task::TaskId;

/// How a dispatched step ended
#[derive(Debug, Clone, PartialEq)]
pub enum StepSignal {
    /// Step finished; the value (if any) becomes the next step's arguments
    Complete(Option<Value>),

    /// Step failed; no further step of the task runs
    Fail(StepError),

    /// Step ended the sequence early without a value
    Terminate,
}

/// Payload of a message sent from a step back to the engine
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StepMessageKind {
    Signal(StepSignal),
    Emit { name: String, payload: Value },
}

/// Message sent from a step back to the engine driver
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StepMessage {
    pub task_id: TaskId,
    pub step: usize,
    pub kind: StepMessageKind,
}

/// Resumption handle for one dispatched step
///
/// Every signalling method consumes the handle, so a step can report at
/// most one outcome. The handle is `Send` and may be moved into spawned
/// work to signal later. If it is dropped without signalling, the engine
/// receives a failure (`error_type = "abandoned"`).
#[derive(Debug)]
pub struct StepHandle {
    task_id: TaskId,
    step: usize,
    tx: Option<mpsc::UnboundedSender<StepMessage>>,
}

impl StepHandle {
    pub(crate) fn new(
        task_id: TaskId,
        step: usize,
        tx: mpsc::UnboundedSender<StepMessage>,
    ) -> Self {
        Self {
            task_id,
            step,
            tx: Some(tx),
        }
    }

    /// Task this step belongs to
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Position of this step in the task's sequence (base steps included)
    pub fn step_index(&self) -> usize {
        self.step
    }

    /// Complete the step with a value passed on to the next step
    pub fn complete(self, value: impl Into<Value>) {
        self.signal(StepSignal::Complete(Some(value.into())));
    }

    /// Complete the step without a value; the next step gets no arguments
    pub fn proceed(self) {
        self.signal(StepSignal::Complete(None));
    }

    /// Fail the step, finishing the task with `status = error`
    pub fn fail(self, error: impl Into<StepError>) {
        self.signal(StepSignal::Fail(error.into()));
    }

    /// End the task early; remaining steps are skipped
    pub fn terminate(self) {
        self.signal(StepSignal::Terminate);
    }

    /// Publish a custom event through the engine while the step runs
    pub fn emit(&self, name: impl Into<String>, payload: Value) {
        if let Some(tx) = &self.tx {
            let message = StepMessage {
                task_id: self.task_id,
                step: self.step,
                kind: StepMessageKind::Emit {
                    name: name.into(),
                    payload,
                },
            };
            if tx.send(message).is_err() {
                debug!(task_id = %self.task_id, step = self.step, "engine gone, dropping step event");
            }
        }
    }

    fn signal(mut self, signal: StepSignal) {
        self.send(signal);
    }

    fn send(&mut self, signal: StepSignal) {
        let Some(tx) = self.tx.take() else {
            return;
        };

        let message = StepMessage {
            task_id: self.task_id,
            step: self.step,
            kind: StepMessageKind::Signal(signal),
        };

        if tx.send(message).is_err() {
            debug!(task_id = %self.task_id, step = self.step, "engine gone, dropping step signal");
        }
    }
}

impl Drop for StepHandle {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!(task_id = %self.task_id, step = self.step, "step handle dropped without signalling");
            self.send(StepSignal::Fail(StepError::abandoned()));
        }
    }
}
