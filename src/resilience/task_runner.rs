//! # Task Runner
//!
//! Executes exactly one task under a hard deadline. A runner never sees the
//! breaker's control state; it only turns the task's result (or the lack of
//! one) into a [`TaskOutcome`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use uuid::Uuid;

use super::circuit_breaker::CircuitBreakerError;
use super::task::{BoxedTask, TaskOutcome};

/// Transient executor for a single call
#[derive(Debug)]
pub struct TaskRunner {
    component: Arc<str>,
    call_id: Uuid,
}

impl TaskRunner {
    pub fn new(component: Arc<str>, call_id: Uuid) -> Self {
        Self { component, call_id }
    }

    /// Run the task, giving up once `deadline` elapses.
    ///
    /// On expiry the task future is dropped, so a late completion can never
    /// be observed by anyone.
    pub async fn execute<T, E>(self, task: BoxedTask<T, E>, deadline: Duration) -> TaskOutcome<T, E> {
        let started = Instant::now();
        let future = task();

        match tokio::time::timeout(deadline, future).await {
            Ok(Ok(value)) => {
                debug!(
                    component = %self.component,
                    call_id = %self.call_id,
                    duration_ms = started.elapsed().as_millis(),
                    "🟢 Task succeeded"
                );
                TaskOutcome::Success(value)
            }
            Ok(Err(error)) => {
                debug!(
                    component = %self.component,
                    call_id = %self.call_id,
                    duration_ms = started.elapsed().as_millis(),
                    "🔴 Task failed"
                );
                TaskOutcome::Failure(CircuitBreakerError::OperationFailed(error))
            }
            Err(_elapsed) => {
                warn!(
                    component = %self.component,
                    call_id = %self.call_id,
                    timeout_ms = deadline.as_millis(),
                    "⏱️ Task exceeded run timeout"
                );
                TaskOutcome::Failure(CircuitBreakerError::Timeout {
                    component: self.component.to_string(),
                    timeout: deadline,
                })
            }
        }
    }
}
