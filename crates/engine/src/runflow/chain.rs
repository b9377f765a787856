//! Chained run flow

use tracing::{debug, instrument};

use super::{RunflowError, SequenceRequest};
use crate::engine::Engine;
use crate::step::StepError;
use crate::task::TaskOutcome;

/// Run sequences back to back, each chosen from the previous outcome
///
/// `first` is submitted, then every task's outcome is handed to `next`,
/// which returns the following request or `None` to stop. Step failures are
/// passed to `next` as `Err` so the caller decides whether to continue.
/// Returns the number of tasks that ran.
///
/// # Example
///
/// ```ignore
/// // Keep doubling until the value passes 1500
/// let tasks = run_chain(&engine, SequenceRequest::new(doubling()).with_arguments(vec![json!(10)]), |outcome| {
///     let value = outcome.ok()?.results()?.as_i64()?;
///     (value <= 1500).then(|| SequenceRequest::new(doubling()).with_arguments(vec![json!(value)]))
/// })
/// .await?;
/// ```
#[instrument(skip_all)]
pub async fn run_chain<R, F>(
    engine: &Engine<R>,
    first: SequenceRequest<R>,
    mut next: F,
) -> Result<usize, RunflowError>
where
    R: Send + Sync + 'static,
    F: FnMut(Result<TaskOutcome, StepError>) -> Option<SequenceRequest<R>>,
{
    let mut request = Some(first);
    let mut tasks = 0;

    while let Some(current) = request.take() {
        let done = engine
            .submit_and_wait(current.sequence, current.arguments)
            .await?;
        tasks += 1;

        debug!(task_id = %done.id, status = %done.status, tasks, "chained task finished");

        request = next(done.into_result());
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{Sequence, StepHandle};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn doubling(steps: usize) -> Sequence<()> {
        (0..steps).fold(Sequence::new(), |sequence, _| {
            sequence.then(|handle: StepHandle, _: Arc<()>, args: Vec<Value>| {
                let n = args[0].as_i64().unwrap();
                tokio::spawn(async move { handle.complete(n * 2) });
            })
        })
    }

    #[tokio::test]
    async fn test_chain_feeds_results_forward() {
        let engine = Engine::builder(()).switch_on(true).build();
        let mut last = 0;

        let tasks = run_chain(
            &engine,
            SequenceRequest::new(doubling(3)).with_arguments(vec![json!(10)]),
            |outcome| {
                let value = outcome.unwrap().results().unwrap().as_i64().unwrap();
                last = value;
                (value <= 1500)
                    .then(|| SequenceRequest::new(doubling(3)).with_arguments(vec![json!(value)]))
            },
        )
        .await
        .unwrap();

        // 10 -> 80 -> 640 -> 5120
        assert_eq!(tasks, 3);
        assert_eq!(last, 5120);
    }

    #[tokio::test]
    async fn test_chain_lets_caller_recover_from_failure() {
        let engine = Engine::builder(()).switch_on(true).build();
        let failing =
            Sequence::new().then(|handle: StepHandle, _: Arc<()>, _| handle.fail("flaky page"));
        let mut failures = 0;

        let tasks = run_chain(&engine, SequenceRequest::new(failing), |outcome| match outcome {
            Err(error) => {
                assert_eq!(error.message, "flaky page");
                failures += 1;
                Some(SequenceRequest::new(doubling(1)).with_arguments(vec![json!(1)]))
            }
            Ok(outcome) => {
                assert_eq!(outcome.results(), Some(&json!(2)));
                None
            }
        })
        .await
        .unwrap();

        assert_eq!(tasks, 2);
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn test_chain_stops_after_first_when_next_declines() {
        let engine = Engine::builder(()).switch_on(true).build();

        let tasks = run_chain(&engine, SequenceRequest::<()>::base_only(), |_| None)
            .await
            .unwrap();

        assert_eq!(tasks, 1);
    }
}
