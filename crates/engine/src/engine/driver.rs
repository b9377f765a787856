//! Engine driver
//!
//! The driver is the only owner of the engine's mutable state: status,
//! pending queue, in-flight cycle, listeners and completion waiters. Handles
//! talk to it through the command channel and steps through the signal
//! channel, so no lock guards any of it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use super::status::EngineStatus;
use super::EngineSnapshot;
use crate::cycle::{Advance, CycleContext, StepCycle};
use crate::error::EngineError;
use crate::event::EngineEvent;
use crate::listener::{EventBus, EventListener, ListenerId};
use crate::step::{Sequence, StepMessage, StepMessageKind};
use crate::task::{TaskDone, TaskId};

/// Requests sent from `Engine` handles to the driver
pub(crate) enum Command<R> {
    Submit {
        id: TaskId,
        sequence: Option<Sequence<R>>,
        args: Vec<Value>,
        waiter: Option<oneshot::Sender<TaskDone>>,
    },
    SwitchOn,
    SwitchOff,
    AddListener {
        id: ListenerId,
        listener: Arc<dyn EventListener>,
    },
    RemoveListener(ListenerId),
    Snapshot(oneshot::Sender<EngineSnapshot>),
}

pub(crate) struct EngineDriver<R> {
    status: EngineStatus,
    status_tx: watch::Sender<EngineStatus>,
    base: Sequence<R>,
    resource: Arc<R>,
    queue: VecDeque<StepCycle<R>>,
    in_flight: Option<StepCycle<R>>,
    bus: EventBus,
    waiters: HashMap<TaskId, oneshot::Sender<TaskDone>>,
    commands: mpsc::UnboundedReceiver<Command<R>>,
    commands_closed: bool,
    signals: mpsc::UnboundedReceiver<StepMessage>,
    signal_tx: mpsc::UnboundedSender<StepMessage>,
}

impl<R> EngineDriver<R>
where
    R: Send + Sync + 'static,
{
    pub fn new(
        status: EngineStatus,
        status_tx: watch::Sender<EngineStatus>,
        base: Sequence<R>,
        resource: Arc<R>,
        bus: EventBus,
        commands: mpsc::UnboundedReceiver<Command<R>>,
    ) -> Self {
        let (signal_tx, signals) = mpsc::unbounded_channel();

        Self {
            status,
            status_tx,
            base,
            resource,
            queue: VecDeque::new(),
            in_flight: None,
            bus,
            waiters: HashMap::new(),
            commands,
            commands_closed: false,
            signals,
            signal_tx,
        }
    }

    /// Process commands and step signals until every handle is gone and
    /// nothing is left to run, or an invariant is violated.
    pub async fn run(mut self) {
        info!(status = %self.status, base_steps = self.base.len(), "engine driver started");

        loop {
            if self.commands_closed && self.is_idle() {
                debug!("all engine handles dropped and engine is idle");
                break;
            }

            tokio::select! {
                biased;

                command = self.commands.recv(), if !self.commands_closed => match command {
                    Some(command) => self.on_command(command),
                    None => self.commands_closed = true,
                },
                Some(message) = self.signals.recv() => {
                    if let Err(e) = self.on_step_message(message) {
                        error!(error = %e, "engine invariant violated, shutting down driver");
                        break;
                    }
                }
                else => break,
            }
        }

        if !self.queue.is_empty() {
            warn!(queued = self.queue.len(), "engine driver exiting with queued tasks");
        }
        info!("engine driver stopped");
    }

    fn is_idle(&self) -> bool {
        self.in_flight.is_none() && (self.queue.is_empty() || self.status.is_off())
    }

    fn on_command(&mut self, command: Command<R>) {
        match command {
            Command::Submit {
                id,
                sequence,
                args,
                waiter,
            } => self.submit(id, sequence, args, waiter),
            Command::SwitchOn => self.switch_on(),
            Command::SwitchOff => self.switch_off(),
            Command::AddListener { id, listener } => self.bus.add(id, listener),
            Command::RemoveListener(id) => {
                if !self.bus.remove(id) {
                    debug!(%id, "listener was not registered");
                }
            }
            Command::Snapshot(reply) => {
                // Caller may have given up waiting
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn submit(
        &mut self,
        id: TaskId,
        sequence: Option<Sequence<R>>,
        args: Vec<Value>,
        waiter: Option<oneshot::Sender<TaskDone>>,
    ) {
        let sequence = match sequence {
            Some(sequence) => self.base.concat(&sequence),
            None => self.base.clone(),
        };

        info!(task_id = %id, steps = sequence.len(), queued = self.queue.len(), "task enqueued");

        self.queue.push_back(StepCycle::new(id, sequence, args));
        if let Some(waiter) = waiter {
            self.waiters.insert(id, waiter);
        }
        self.bus.publish(&EngineEvent::TaskEnqueued { id });

        if self.status == EngineStatus::WaitingToRunTask && self.in_flight.is_none() {
            self.run_next();
        }
    }

    fn switch_on(&mut self) {
        if !self.status.is_off() {
            debug!(status = %self.status, "switch_on ignored, engine already on");
            return;
        }

        self.change_status(EngineStatus::WaitingToRunTask);

        // A cycle stopped by switch_off may still await its in-flight step
        if self.in_flight.is_some() {
            self.change_status(EngineStatus::RunningATask);
        } else {
            self.run_next();
        }
    }

    fn switch_off(&mut self) {
        self.change_status(EngineStatus::Off);
    }

    /// Start queued cycles until one suspends on a step, the queue is empty,
    /// or the engine is switched off.
    fn run_next(&mut self) {
        while let Some(mut cycle) = self.queue.pop_front() {
            self.change_status(EngineStatus::RunningATask);

            match cycle.start(self.cycle_context()) {
                Advance::Dispatched => {
                    self.in_flight = Some(cycle);
                    return;
                }
                Advance::Finished(done) => {
                    self.finalize(done);
                    if self.status.is_off() {
                        return;
                    }
                }
            }
        }

        self.change_status(EngineStatus::WaitingToRunTask);
    }

    fn on_step_message(&mut self, message: StepMessage) -> Result<(), EngineError> {
        let Some(mut cycle) = self.in_flight.take() else {
            return Err(EngineError::UnexpectedSignal {
                task_id: message.task_id,
                step: message.step,
                reason: "no task in flight".to_string(),
            });
        };

        if cycle.id() != message.task_id || cycle.current_step() != message.step {
            let err = EngineError::UnexpectedSignal {
                task_id: message.task_id,
                step: message.step,
                reason: format!(
                    "in-flight step is {} of task {}",
                    cycle.current_step(),
                    cycle.id()
                ),
            };
            self.in_flight = Some(cycle);
            return Err(err);
        }

        match message.kind {
            StepMessageKind::Emit { name, payload } => {
                self.bus.publish(&EngineEvent::StepEmitted {
                    task_id: message.task_id,
                    step: message.step,
                    name,
                    payload,
                });
                self.in_flight = Some(cycle);
            }
            StepMessageKind::Signal(signal) => {
                debug!(task_id = %message.task_id, step = message.step, ?signal, "step signalled");

                match cycle.resume(signal, self.cycle_context()) {
                    Advance::Dispatched => self.in_flight = Some(cycle),
                    Advance::Finished(done) => {
                        self.finalize(done);
                        if !self.status.is_off() {
                            self.run_next();
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn finalize(&mut self, done: TaskDone) {
        info!(task_id = %done.id, status = %done.status, "task finished");

        self.bus.publish(&EngineEvent::TaskDone(done.clone()));

        if let Some(waiter) = self.waiters.remove(&done.id) {
            if waiter.send(done).is_err() {
                debug!("task waiter dropped before completion");
            }
        }
    }

    fn change_status(&mut self, status: EngineStatus) {
        debug!(from = %self.status, to = %status, "engine status transition");
        self.status = status;
        self.status_tx.send_replace(status);
        self.bus.publish(&EngineEvent::StatusChanged { status });
    }

    fn cycle_context(&mut self) -> CycleContext<'_, R> {
        CycleContext {
            resource: &self.resource,
            signals: &self.signal_tx,
            bus: &mut self.bus,
            switched_off: self.status.is_off(),
        }
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            status: self.status,
            queued: self.queue.len(),
            in_flight: self.in_flight.as_ref().map(|cycle| cycle.id()),
            in_flight_step: self.in_flight.as_ref().map(|cycle| cycle.current_step()),
            in_flight_steps: self.in_flight.as_ref().map(|cycle| cycle.len()),
            listeners: self.bus.len(),
        }
    }
}
