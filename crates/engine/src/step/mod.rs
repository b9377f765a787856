//! Step abstractions
//!
//! This module contains the pieces a step author touches:
//! - [`Step`] trait (blanket-implemented for closures)
//! - [`Sequence`] ordered, cheaply clonable step list
//! - [`StepHandle`] single-use resumption handle
//! - [`StepError`] failure value carried into `TaskDone`

mod definition;
mod handle;

pub use definition::{Sequence, Step, StepError};
pub use handle::{StepHandle, StepSignal};

pub(crate) use definition::spread_arguments;
pub(crate) use handle::{StepMessage, StepMessageKind};
