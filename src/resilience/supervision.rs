//! # Supervision Policy
//!
//! Fault boundary around [`TaskRunner`]. Every execution runs in its own
//! tokio task; a panic there (including one raised while building the task's
//! future) comes back as a `JoinError` and is converted into an ordinary
//! failure outcome. The breaker only ever sees that outcome.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tracing::error;

use super::circuit_breaker::CircuitBreakerError;
use super::task::{BoxedTask, TaskOutcome};
use super::task_runner::TaskRunner;

#[derive(Debug, Clone)]
pub struct SupervisionPolicy {
    component: Arc<str>,
}

impl SupervisionPolicy {
    pub fn new(component: Arc<str>) -> Self {
        Self { component }
    }

    /// Run `runner` to completion, isolating the caller from its defects
    pub async fn supervise<T, E>(
        &self,
        runner: TaskRunner,
        task: BoxedTask<T, E>,
        deadline: Duration,
    ) -> TaskOutcome<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        let mut guard = RunnerGuard::new(tokio::spawn(runner.execute(task, deadline)));

        match guard.join().await {
            Ok(outcome) => outcome,
            Err(join_error) => self.defect_outcome(join_error),
        }
    }

    fn defect_outcome<T, E>(&self, join_error: JoinError) -> TaskOutcome<T, E> {
        let message = if join_error.is_panic() {
            panic_message(join_error.into_panic())
        } else {
            "task runner was cancelled".to_string()
        };

        error!(
            component = %self.component,
            defect = %message,
            "💥 Task runner crashed; reporting as failure"
        );

        TaskOutcome::Failure(CircuitBreakerError::TaskPanicked {
            component: self.component.to_string(),
            message,
        })
    }
}

/// Aborts the runner task on every exit path of the supervising future
struct RunnerGuard<O> {
    handle: JoinHandle<O>,
}

impl<O> RunnerGuard<O> {
    fn new(handle: JoinHandle<O>) -> Self {
        Self { handle }
    }

    async fn join(&mut self) -> Result<O, JoinError> {
        (&mut self.handle).await
    }
}

impl<O> Drop for RunnerGuard<O> {
    fn drop(&mut self) {
        // no-op once the task has finished
        self.handle.abort();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
