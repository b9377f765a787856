//! Engine status

use serde::{Deserialize, Serialize};

/// Engine states
///
/// # State Machine
///
/// ```text
///              switch_on                    queue non-empty
/// ┌─────┐ ─────────────────► ┌──────────────────┐ ──────────► ┌────────────────┐
/// │ Off │                    │ WaitingToRunTask │             │ RunningATask   │
/// └─────┘ ◄───────────────── └──────────────────┘ ◄────────── └────────────────┘
///    ▲        switch_off                          queue empty          │
///    └──────────────────────────── switch_off ─────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineStatus {
    /// Queued tasks are not started
    Off,

    /// Idle and switched on; a submission starts immediately
    WaitingToRunTask,

    /// A task is in flight; submissions queue behind it
    RunningATask,
}

impl EngineStatus {
    pub fn is_off(&self) -> bool {
        matches!(self, Self::Off)
    }
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::WaitingToRunTask => write!(f, "waiting-to-run-task"),
            Self::RunningATask => write!(f, "running-a-task"),
        }
    }
}
