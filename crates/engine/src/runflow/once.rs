//! Single-task run flow

use tracing::{debug, instrument};

use super::{RunflowError, SequenceRequest};
use crate::engine::Engine;
use crate::task::TaskOutcome;

/// Submit one sequence and wait for its outcome
///
/// Resolves with `TaskOutcome::Completed(results)` or `TaskOutcome::Stopped`;
/// a step failure is returned as `RunflowError::Step`.
///
/// # Example
///
/// ```ignore
/// let outcome = run_once(&engine, SequenceRequest::new(search).with_arguments(vec![json!("rust")])).await?;
/// let title = outcome.results().cloned();
/// ```
#[instrument(skip_all)]
pub async fn run_once<R>(
    engine: &Engine<R>,
    request: SequenceRequest<R>,
) -> Result<TaskOutcome, RunflowError>
where
    R: Send + Sync + 'static,
{
    let done = engine
        .submit_and_wait(request.sequence, request.arguments)
        .await?;

    debug!(task_id = %done.id, status = %done.status, "run_once task finished");

    Ok(done.into_result()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{Sequence, StepHandle};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn engine() -> Engine<()> {
        Engine::builder(()).switch_on(true).build()
    }

    #[tokio::test]
    async fn test_run_once_returns_results() {
        let engine = engine();
        let sequence = Sequence::new().then(|handle: StepHandle, _: Arc<()>, args: Vec<Value>| {
            handle.complete(json!(format!("hello {}", args[0].as_str().unwrap())));
        });

        let outcome = run_once(
            &engine,
            SequenceRequest::new(sequence).with_arguments(vec![json!("world")]),
        )
        .await
        .unwrap();

        assert_eq!(outcome, TaskOutcome::Completed(Some(json!("hello world"))));
    }

    #[tokio::test]
    async fn test_run_once_surfaces_step_error() {
        let engine = engine();
        let sequence =
            Sequence::new().then(|handle: StepHandle, _: Arc<()>, _| handle.fail("Aborted"));

        let err = run_once(&engine, SequenceRequest::new(sequence))
            .await
            .unwrap_err();

        match err {
            RunflowError::Step(error) => assert_eq!(error.message, "Aborted"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_once_base_only_without_steps() {
        let engine = engine();

        let outcome = run_once(&engine, SequenceRequest::base_only())
            .await
            .unwrap();

        assert_eq!(outcome, TaskOutcome::Completed(None));
    }
}
