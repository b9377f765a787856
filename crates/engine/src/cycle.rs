//! Step cycle: drives one task's sequence
//!
//! A cycle never polls. It dispatches a step and returns
//! [`Advance::Dispatched`]; the engine hands the step's signal back through
//! [`StepCycle::resume`], which either dispatches the next step or finishes
//! the task. Every path ends in exactly one [`TaskDone`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::event::EngineEvent;
use crate::listener::EventBus;
use crate::step::{spread_arguments, Sequence, StepError, StepHandle, StepMessage, StepSignal};
use crate::task::{TaskDone, TaskId};

/// What happened after the cycle was started or resumed
#[derive(Debug)]
pub(crate) enum Advance {
    /// A step was dispatched; wait for its signal
    Dispatched,

    /// The task is finalized
    Finished(TaskDone),
}

/// Engine-owned state a cycle needs while dispatching
pub(crate) struct CycleContext<'a, R> {
    pub resource: &'a Arc<R>,
    pub signals: &'a mpsc::UnboundedSender<StepMessage>,
    pub bus: &'a mut EventBus,
    pub switched_off: bool,
}

pub(crate) struct StepCycle<R> {
    id: TaskId,
    sequence: Sequence<R>,
    cursor: usize,
    args: Option<Value>,
    panic: Option<String>,
    finished: bool,
}

impl<R> StepCycle<R> {
    pub fn new(id: TaskId, sequence: Sequence<R>, initial_args: Vec<Value>) -> Self {
        Self {
            id,
            sequence,
            cursor: 0,
            args: Some(Value::Array(initial_args)),
            panic: None,
            finished: false,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Index of the step currently awaited
    pub fn current_step(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Begin driving the sequence
    pub fn start(&mut self, ctx: CycleContext<'_, R>) -> Advance {
        debug!(task_id = %self.id, steps = self.sequence.len(), "starting step cycle");

        if self.sequence.is_empty() {
            return self.finish(TaskDone::ok(self.id, None));
        }

        self.dispatch(ctx)
    }

    /// Feed the signal of the in-flight step back into the cycle
    pub fn resume(&mut self, signal: StepSignal, ctx: CycleContext<'_, R>) -> Advance {
        match signal {
            StepSignal::Complete(value) => {
                ctx.bus.publish(&EngineEvent::StepSequenceEnds {
                    task_id: self.id,
                    step: self.cursor,
                    result: value.clone(),
                });

                self.args = value;
                self.cursor += 1;

                if self.cursor >= self.sequence.len() {
                    let results = self.args.take();
                    return self.finish(TaskDone::ok(self.id, results));
                }

                self.dispatch(ctx)
            }
            StepSignal::Fail(error) => {
                let error = match self.panic.take() {
                    Some(message) if error.is_abandoned() => StepError::panicked(message),
                    _ => error,
                };

                info!(task_id = %self.id, step = self.cursor, %error, "step failed");
                self.args = None;
                self.finish(TaskDone::failed(self.id, error))
            }
            StepSignal::Terminate => {
                debug!(task_id = %self.id, step = self.cursor, "step terminated the sequence");
                self.args = None;
                self.finish(TaskDone::ok(self.id, None))
            }
        }
    }

    fn dispatch(&mut self, ctx: CycleContext<'_, R>) -> Advance {
        if ctx.switched_off {
            info!(task_id = %self.id, step = self.cursor, "engine switched off, stopping task");
            self.args = None;
            return self.finish(TaskDone::stopped(self.id));
        }

        let Some(step) = self.sequence.get(self.cursor).cloned() else {
            let results = self.args.take();
            return self.finish(TaskDone::ok(self.id, results));
        };

        ctx.bus.publish(&EngineEvent::StepSequenceStarts {
            task_id: self.id,
            step: self.cursor,
            arguments: self.args.clone(),
        });

        let args = spread_arguments(self.args.clone());
        self.panic = None;
        let handle = StepHandle::new(self.id, self.cursor, ctx.signals.clone());
        let resource = Arc::clone(ctx.resource);

        debug!(task_id = %self.id, step = self.cursor, args = args.len(), "dispatching step");

        // A panicking step drops its handle while unwinding, so the
        // abandoned signal still arrives and carries the panic message
        let dispatched = panic::catch_unwind(AssertUnwindSafe(|| step.call(handle, resource, args)));
        if let Err(payload) = dispatched {
            let message = format!("step panicked: {}", panic_message(payload.as_ref()));
            error!(task_id = %self.id, step = self.cursor, %message, "step panicked during dispatch");
            self.panic = Some(message);
        }

        Advance::Dispatched
    }

    fn finish(&mut self, done: TaskDone) -> Advance {
        debug_assert!(!self.finished, "step cycle finalized twice");
        self.finished = true;
        Advance::Finished(done)
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
