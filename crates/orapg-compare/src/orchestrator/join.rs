//! Fixed fan-out task join.
//!
//! Spawns exactly K independent tasks and waits for every one of them to
//! terminate. Nothing is cancelled when a task fails: each task's own
//! outcome value captures its success or failure, and the join is a
//! barrier, not a race. A task that dies outside its own error handling
//! (a panic) is re-raised as [`CompareError::Worker`] — but only after all
//! the other tasks have finished.

use std::future::Future;
use std::pin::Pin;

use crate::error::{CompareError, Result};

/// A boxed task future, so heterogeneous async blocks can share one
/// fan-out call.
pub type TaskFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Box a future for [`fan_out`].
pub fn boxed<T, F>(future: F) -> TaskFuture<T>
where
    F: Future<Output = T> + Send + 'static,
{
    Box::pin(future)
}

/// Spawn every task, wait for all of them, and return their outputs in
/// input order.
pub async fn fan_out<T>(tasks: Vec<TaskFuture<T>>) -> Result<Vec<T>>
where
    T: Send + 'static,
{
    let handles: Vec<_> = tasks.into_iter().map(tokio::spawn).collect();

    let mut outputs = Vec::with_capacity(handles.len());
    let mut first_panic: Option<CompareError> = None;
    for handle in handles {
        match handle.await {
            Ok(value) => outputs.push(value),
            Err(join_error) => {
                if first_panic.is_none() {
                    first_panic = Some(CompareError::Worker(join_error.to_string()));
                }
            }
        }
    }

    match first_panic {
        Some(err) => Err(err),
        None => Ok(outputs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    #[tokio::test(start_paused = true)]
    async fn test_barrier_waits_for_slow_side() {
        // Left fails immediately, right succeeds after 500ms: the combined
        // result is only available after 500ms and contains both outcomes.
        let started = Instant::now();
        let results = fan_out(vec![
            boxed(async { Err::<&str, String>("left failed".to_string()) }),
            boxed(async {
                sleep(Duration::from_millis(500)).await;
                Ok::<&str, String>("right ok")
            }),
        ])
        .await
        .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], Err("left failed".to_string()));
        assert_eq!(results[1], Ok("right ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_cancel_other_task() {
        let (tx, rx) = tokio::sync::oneshot::channel::<&str>();
        let results = fan_out(vec![
            boxed(async { "fast" }),
            boxed(async move {
                sleep(Duration::from_millis(100)).await;
                let _ = tx.send("slow ran to completion");
                "slow"
            }),
        ])
        .await
        .unwrap();

        assert_eq!(results, vec!["fast", "slow"]);
        assert_eq!(rx.await.unwrap(), "slow ran to completion");
    }

    #[tokio::test]
    async fn test_panic_reraised_after_all_tasks_finish() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let err = fan_out(vec![
            boxed(async { panic!("worker blew up") }),
            boxed(async move {
                let _ = tx.send(());
            }),
        ])
        .await
        .unwrap_err();

        assert!(matches!(err, CompareError::Worker(_)));
        // The non-panicking task still ran to completion.
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn test_outputs_preserve_input_order() {
        let results = fan_out(vec![
            boxed(async {
                sleep(Duration::from_millis(20)).await;
                1
            }),
            boxed(async { 2 }),
            boxed(async {
                sleep(Duration::from_millis(10)).await;
                3
            }),
        ])
        .await
        .unwrap();
        assert_eq!(results, vec![1, 2, 3]);
    }
}
