//! Engine configuration

use std::env;

use serde::{Deserialize, Serialize};

/// Engine configuration
///
/// The base sequence is not part of this struct because it holds step
/// closures; pass it to `EngineBuilder::base_sequence`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Start in `waiting-to-run-task` instead of `off`
    pub switch_on: bool,

    /// Register a `TracingListener` that logs every event
    pub trace_events: bool,
}

impl EngineConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `STEPLINE_SWITCH_ON`: start switched on (default: false)
    /// - `STEPLINE_TRACE_EVENTS`: log every engine event (default: false)
    pub fn from_env() -> Self {
        Self {
            switch_on: env_flag("STEPLINE_SWITCH_ON").unwrap_or(false),
            trace_events: env_flag("STEPLINE_TRACE_EVENTS").unwrap_or(false),
        }
    }

    /// Start switched on
    pub fn with_switch_on(mut self, switch_on: bool) -> Self {
        self.switch_on = switch_on;
        self
    }

    /// Log every engine event
    pub fn with_trace_events(mut self, trace_events: bool) -> Self {
        self.trace_events = trace_events;
        self
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name).ok().map(|v| parse_flag(&v))
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value == "true" || value == "1" || value == "yes" || value == "on"
}
