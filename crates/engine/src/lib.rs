//! # Step Sequencing Engine
//!
//! An in-process scheduler that runs ordered lists of asynchronous steps
//! against one shared, stateful resource (for example a browser session).
//!
//! ## Features
//!
//! - **One step in flight**: tasks run strictly one at a time, in FIFO submission order
//! - **Deferred completion**: a step signals through a single-use [`StepHandle`],
//!   synchronously or from any later async work
//! - **On/off switch**: switching off stops the running task at its next step
//!   boundary and keeps queued tasks until the engine is switched on again
//! - **Base sequence**: steps prepended to every submitted task
//! - **Typed events**: status changes, step boundaries and task completion
//!   delivered to registered [`EventListener`]s
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Engine                            │
//! │  (clonable handle: submit, switch_on/off, subscribe)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ commands
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EngineDriver                         │
//! │  (owns status, FIFO queue, in-flight StepCycle, listeners)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ dispatch          ▲ signals
//!                              ▼                   │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                            Steps                            │
//! │  step(handle, resource, args) -> complete/fail/terminate    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use stepline_engine::prelude::*;
//! use serde_json::json;
//!
//! let double = |handle: StepHandle, _: Arc<Browser>, args: Vec<Value>| {
//!     let n = args[0].as_i64().unwrap_or_default();
//!     tokio::spawn(async move { handle.complete(n * 2) });
//! };
//!
//! let engine = Engine::builder(browser).switch_on(true).build();
//! let sequence = Sequence::new().then(double).then(double).then(double);
//!
//! let done = engine.submit_and_wait(Some(sequence), vec![json!(10)]).await?;
//! assert_eq!(done.results, Some(json!(80)));
//! ```

mod cycle;
pub mod engine;
pub mod error;
pub mod event;
pub mod listener;
pub mod runflow;
pub mod step;
pub mod task;

/// Prelude for common imports
pub mod prelude {
    pub use crate::engine::{Engine, EngineBuilder, EngineConfig, EngineSnapshot, EngineStatus};
    pub use crate::error::EngineError;
    pub use crate::event::{event_kinds, EngineEvent};
    pub use crate::listener::{EventListener, EventStream, ListenerId};
    pub use crate::runflow::{run_chain, run_once, RunflowError, SequenceRequest};
    pub use crate::step::{Sequence, Step, StepError, StepHandle, StepSignal};
    pub use crate::task::{TaskDone, TaskId, TaskOutcome, TaskStatus};
    pub use serde_json::Value;
    pub use std::sync::Arc;
}

// Re-export key types at crate root
pub use engine::{Engine, EngineBuilder, EngineConfig, EngineSnapshot, EngineStatus};
pub use error::EngineError;
pub use event::EngineEvent;
pub use listener::{
    ChannelListener, EventListener, EventStream, ListenerId, NoopEventListener, TracingListener,
};
pub use runflow::{run_chain, run_once, RunflowError, SequenceRequest};
pub use step::{Sequence, Step, StepError, StepHandle, StepSignal};
pub use task::{TaskDone, TaskId, TaskOutcome, TaskStatus};
