//! Run flows
//!
//! Helpers that drive the engine from async code instead of listening for
//! `TaskDone` events by hand:
//! - [`run_once`] submits one sequence and resolves with its outcome
//! - [`run_chain`] keeps submitting sequences, each chosen from the
//!   previous task's outcome, until the caller stops
//!
//! Both wait for their tasks like any other submitter: if the engine is
//! switched off, they wait until it is switched on again.

mod chain;
mod once;

use serde_json::Value;

use crate::error::EngineError;
use crate::step::{Sequence, StepError};

pub use chain::run_chain;
pub use once::run_once;

/// A sequence to submit together with its initial arguments
pub struct SequenceRequest<R> {
    /// Task-specific steps, run after the engine's base sequence
    pub sequence: Option<Sequence<R>>,

    /// Arguments handed to the first step
    pub arguments: Vec<Value>,
}

impl<R> SequenceRequest<R> {
    /// Request running `sequence` after the base sequence
    pub fn new(sequence: Sequence<R>) -> Self {
        Self {
            sequence: Some(sequence),
            arguments: Vec::new(),
        }
    }

    /// Request running the base sequence alone
    pub fn base_only() -> Self {
        Self {
            sequence: None,
            arguments: Vec::new(),
        }
    }

    /// Set the initial arguments
    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }
}

impl<R> Clone for SequenceRequest<R> {
    fn clone(&self) -> Self {
        Self {
            sequence: self.sequence.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

impl<R> std::fmt::Debug for SequenceRequest<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceRequest")
            .field("sequence", &self.sequence)
            .field("arguments", &self.arguments)
            .finish()
    }
}

/// Errors from run flows
#[derive(Debug, thiserror::Error)]
pub enum RunflowError {
    /// Engine error
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// A step of the task failed
    #[error("step failed: {0}")]
    Step(#[from] StepError),
}
