//! Task engine
//!
//! The engine module provides the [`Engine`] handle, which queues tasks,
//! gates their execution on an on/off switch and runs exactly one step
//! cycle at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  commands   ┌───────────────────────────────────────┐
//! │ Engine (N×)  │ ──────────► │             EngineDriver              │
//! └──────────────┘             │  status · queue · in-flight cycle     │
//!                              │  listeners · completion waiters       │
//! ┌──────────────┐  signals    │                                       │
//! │ StepHandle   │ ──────────► │  StepCycle::start / StepCycle::resume │
//! └──────────────┘             └───────────────────────────────────────┘
//!                                               │ events
//!                                               ▼
//!                                        EventListener(s)
//! ```

mod config;
mod driver;
mod handle;
mod status;

use serde::{Deserialize, Serialize};

use crate::task::TaskId;

pub use config::EngineConfig;
pub use handle::{Engine, EngineBuilder};
pub use status::EngineStatus;

/// Point-in-time view of the engine, taken by the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Current status
    pub status: EngineStatus,

    /// Tasks waiting to start
    pub queued: usize,

    /// Task currently being driven, if any
    pub in_flight: Option<TaskId>,

    /// Step of the in-flight task awaiting its signal
    pub in_flight_step: Option<usize>,

    /// Total steps of the in-flight task
    pub in_flight_steps: Option<usize>,

    /// Registered listeners
    pub listeners: usize,
}

impl EngineSnapshot {
    /// No task in flight and nothing queued
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queued == 0
    }
}
