//! Step trait, step sequences and step failures

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::StepHandle;

/// Error type for step failures
///
/// This is the value a step hands to [`StepHandle::fail`]. It is carried
/// unchanged into the task's `TaskDone::error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepError {
    /// Error message
    pub message: String,

    /// Error type/code for programmatic handling
    pub error_type: Option<String>,

    /// Additional error details (for debugging)
    pub details: Option<Value>,
}

impl StepError {
    pub(crate) const ABANDONED: &'static str = "abandoned";
    pub(crate) const PANICKED: &'static str = "panicked";

    /// Create a new error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            details: None,
        }
    }

    /// Set the error type
    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Add error details
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// A step dropped its handle without signalling
    pub(crate) fn abandoned() -> Self {
        Self::new("step dropped its handle without signalling").with_type(Self::ABANDONED)
    }

    /// A step panicked while it was being dispatched
    pub(crate) fn panicked(message: impl Into<String>) -> Self {
        Self::new(message).with_type(Self::PANICKED)
    }

    pub fn is_abandoned(&self) -> bool {
        self.error_type.as_deref() == Some(Self::ABANDONED)
    }

    pub fn is_panic(&self) -> bool {
        self.error_type.as_deref() == Some(Self::PANICKED)
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StepError {}

impl From<anyhow::Error> for StepError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<&str> for StepError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for StepError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// A single unit of a task's sequence
///
/// The engine calls a step with its single-use [`StepHandle`], the
/// controlled resource and the arguments produced by the previous step.
/// The call itself must not block: it runs on the engine's driver. The step
/// signals its outcome through the handle, either before returning or later
/// from any other task or thread.
///
/// Closures with the matching signature implement this trait, so most
/// sequences are built with [`Sequence::then`].
///
/// # Example
///
/// ```ignore
/// struct Navigate { url: String }
///
/// impl Step<Browser> for Navigate {
///     fn call(&self, handle: StepHandle, browser: Arc<Browser>, _args: Vec<Value>) {
///         let url = self.url.clone();
///         tokio::spawn(async move {
///             match browser.goto(&url).await {
///                 Ok(title) => handle.complete(title),
///                 Err(e) => handle.fail(StepError::from(e)),
///             }
///         });
///     }
/// }
/// ```
pub trait Step<R>: Send + Sync {
    /// Dispatch the step
    fn call(&self, handle: StepHandle, resource: Arc<R>, args: Vec<Value>);
}

impl<R, F> Step<R> for F
where
    F: Fn(StepHandle, Arc<R>, Vec<Value>) + Send + Sync,
{
    fn call(&self, handle: StepHandle, resource: Arc<R>, args: Vec<Value>) {
        self(handle, resource, args)
    }
}

/// Ordered list of steps
///
/// Cloning a sequence is cheap: steps are shared behind `Arc`s, which is how
/// the engine reuses its base sequence for every task.
pub struct Sequence<R> {
    steps: Vec<Arc<dyn Step<R>>>,
}

impl<R> Sequence<R> {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a closure step
    pub fn then<F>(mut self, step: F) -> Self
    where
        F: Fn(StepHandle, Arc<R>, Vec<Value>) + Send + Sync + 'static,
    {
        self.steps.push(Arc::new(step));
        self
    }

    /// Append a step implemented as a type
    pub fn with_step<S>(mut self, step: S) -> Self
    where
        S: Step<R> + 'static,
    {
        self.steps.push(Arc::new(step));
        self
    }

    /// Append a shared step
    pub fn push(&mut self, step: Arc<dyn Step<R>>) {
        self.steps.push(step);
    }

    /// A new sequence running `self` first, then `other`
    pub fn concat(&self, other: &Sequence<R>) -> Self {
        Self {
            steps: self.steps.iter().chain(other.steps.iter()).cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Arc<dyn Step<R>>> {
        self.steps.get(index)
    }
}

impl<R> Default for Sequence<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for Sequence<R> {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
        }
    }
}

impl<R> std::fmt::Debug for Sequence<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("len", &self.steps.len())
            .finish()
    }
}

impl<R> FromIterator<Arc<dyn Step<R>>> for Sequence<R> {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Step<R>>>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

/// Turn the threaded argument into the list handed to the next step
///
/// No value means no arguments, an array is spread, anything else becomes
/// a single argument.
pub(crate) fn spread_arguments(args: Option<Value>) -> Vec<Value> {
    match args {
        None => Vec::new(),
        Some(Value::Array(values)) => values,
        Some(value) => vec![value],
    }
}
