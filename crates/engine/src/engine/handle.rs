//! Public engine handle

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use super::config::EngineConfig;
use super::driver::{Command, EngineDriver};
use super::status::EngineStatus;
use super::EngineSnapshot;
use crate::error::EngineError;
use crate::listener::{ChannelListener, EventBus, EventListener, EventStream, ListenerId, TracingListener};
use crate::step::Sequence;
use crate::task::{TaskDone, TaskId};

/// Task engine handle
///
/// Cloning the handle is cheap; every clone talks to the same engine. The
/// engine keeps running while at least one handle exists, and after the
/// last one is dropped it finishes the in-flight task and stops.
///
/// # Example
///
/// ```ignore
/// use stepline_engine::prelude::*;
///
/// let engine = Engine::builder(browser)
///     .base_sequence(Sequence::new().then(open_session))
///     .switch_on(true)
///     .build();
///
/// let mut events = engine.subscribe()?;
/// let task_id = engine.submit(Some(search_steps), vec![json!("webdriver")])?;
///
/// while let Some(event) = events.recv().await {
///     if let EngineEvent::TaskDone(done) = event {
///         assert_eq!(done.id, task_id);
///         break;
///     }
/// }
/// ```
pub struct Engine<R> {
    commands: mpsc::UnboundedSender<Command<R>>,
    status: watch::Receiver<EngineStatus>,
}

impl<R> Clone for Engine<R> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            status: self.status.clone(),
        }
    }
}

impl<R> std::fmt::Debug for Engine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("status", &*self.status.borrow())
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

impl<R> Engine<R>
where
    R: Send + Sync + 'static,
{
    /// Create an engine with no base sequence, switched off
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(resource: R) -> Self {
        Self::builder(resource).build()
    }

    /// Start building an engine around the controlled resource
    pub fn builder(resource: R) -> EngineBuilder<R> {
        EngineBuilder::new(resource)
    }

    /// Handle talking to an already spawned driver
    pub(super) fn from_channels(
        commands: mpsc::UnboundedSender<Command<R>>,
        status: watch::Receiver<EngineStatus>,
    ) -> Self {
        Self { commands, status }
    }

    /// Queue a task and return its id
    ///
    /// The task runs `base sequence + sequence` (or the base sequence alone
    /// when `sequence` is `None`) with `args` as the first step's arguments.
    /// It starts immediately if the engine is idle and switched on; the
    /// outcome is reported through the `TaskDone` event.
    pub fn submit(
        &self,
        sequence: Option<Sequence<R>>,
        args: Vec<Value>,
    ) -> Result<TaskId, EngineError> {
        let id = TaskId::new();
        self.commands.send(Command::Submit {
            id,
            sequence,
            args,
            waiter: None,
        })?;
        debug!(task_id = %id, "task submitted");
        Ok(id)
    }

    /// Queue a task and wait for its completion payload
    pub async fn submit_and_wait(
        &self,
        sequence: Option<Sequence<R>>,
        args: Vec<Value>,
    ) -> Result<TaskDone, EngineError> {
        let id = TaskId::new();
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Submit {
            id,
            sequence,
            args,
            waiter: Some(tx),
        })?;
        debug!(task_id = %id, "task submitted, awaiting completion");
        Ok(rx.await?)
    }

    /// Switch the engine on and start draining the queue
    ///
    /// No-op unless the engine is off.
    pub fn switch_on(&self) -> Result<(), EngineError> {
        info!("switching engine on");
        self.commands.send(Command::SwitchOn)?;
        Ok(())
    }

    /// Switch the engine off
    ///
    /// The running task stops at its next step boundary; queued tasks stay
    /// queued until `switch_on`.
    pub fn switch_off(&self) -> Result<(), EngineError> {
        info!("switching engine off");
        self.commands.send(Command::SwitchOff)?;
        Ok(())
    }

    /// Last status published by the engine
    ///
    /// Commands sent just before this call may not be reflected yet; use
    /// [`Engine::snapshot`] for an ordered read.
    pub fn status(&self) -> EngineStatus {
        *self.status.borrow()
    }

    /// Receiver notified on every status change
    pub fn watch_status(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    /// Engine state after every previously sent command was processed
    pub async fn snapshot(&self) -> Result<EngineSnapshot, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Snapshot(tx))?;
        Ok(rx.await?)
    }

    /// Register a listener for engine events
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) -> Result<ListenerId, EngineError> {
        let id = ListenerId::next();
        self.commands.send(Command::AddListener { id, listener })?;
        Ok(id)
    }

    /// Unregister a listener
    pub fn remove_listener(&self, id: ListenerId) -> Result<(), EngineError> {
        self.commands.send(Command::RemoveListener(id))?;
        Ok(())
    }

    /// Stream every event published after this call
    ///
    /// Dropping the stream unsubscribes it.
    pub fn subscribe(&self) -> Result<EventStream, EngineError> {
        let (listener, rx) = ChannelListener::new();
        self.add_listener(Arc::new(listener))?;
        Ok(EventStream::new(rx))
    }

    /// Whether the engine driver has stopped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Builder for [`Engine`]
pub struct EngineBuilder<R> {
    resource: R,
    base: Sequence<R>,
    config: EngineConfig,
    listeners: Vec<Arc<dyn EventListener>>,
}

impl<R> EngineBuilder<R>
where
    R: Send + Sync + 'static,
{
    pub fn new(resource: R) -> Self {
        Self {
            resource,
            base: Sequence::new(),
            config: EngineConfig::default(),
            listeners: Vec::new(),
        }
    }

    /// Steps prepended to every submitted sequence
    pub fn base_sequence(mut self, base: Sequence<R>) -> Self {
        self.base = base;
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Start switched on (`waiting-to-run-task`) instead of off
    pub fn switch_on(mut self, switch_on: bool) -> Self {
        self.config.switch_on = switch_on;
        self
    }

    /// Listener registered before any event is published
    pub fn listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Spawn the engine driver and return its handle
    ///
    /// Must be called within a Tokio runtime.
    pub fn build(self) -> Engine<R> {
        let status = if self.config.switch_on {
            EngineStatus::WaitingToRunTask
        } else {
            EngineStatus::Off
        };

        let mut bus = EventBus::new();
        if self.config.trace_events {
            bus.add(ListenerId::next(), Arc::new(TracingListener));
        }
        for listener in self.listeners {
            bus.add(ListenerId::next(), listener);
        }

        let (status_tx, status_rx) = watch::channel(status);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let driver = EngineDriver::new(
            status,
            status_tx,
            self.base,
            Arc::new(self.resource),
            bus,
            commands_rx,
        );
        tokio::spawn(driver.run());

        info!(%status, "engine started");

        Engine::from_channels(commands_tx, status_rx)
    }
}
