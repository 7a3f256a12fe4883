//! # Circuit Breaker Implementation
//!
//! Guards one logical operation with the classic three-state pattern:
//! Closed (normal operation), Open (failing fast) and Half-Open (probing).
//!
//! All control state (state, failure counter, cool-down timer) lives in a
//! single [`BreakerProcessor`] task. Submissions, task outcomes and timer
//! firings arrive as [`BreakerCommand`]s on one ordered channel and are
//! applied one at a time, so no lock guards the state triple. Task execution
//! itself happens concurrently in supervised runner tasks which report back
//! through the same channel.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::CircuitBreakerConfig;
use super::metrics::CircuitBreakerMetrics;
use super::supervision::SupervisionPolicy;
use super::task::{ReplyTo, TaskOutcome, TaskRequest};
use super::task_runner::TaskRunner;
use crate::error::{GuardError, Result};
use crate::logging::log_breaker_transition;

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - calls are dispatched as probes
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
            CircuitState::HalfOpen => f.write_str("half_open"),
        }
    }
}

/// Errors a caller can receive from a guarded call
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open and no fallback was supplied
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Task did not finish within the run timeout
    #[error("Operation timed out after {timeout:?} for {component}")]
    Timeout { component: String, timeout: Duration },

    /// The task's own error, passed through unchanged
    #[error("Operation failed: {0}")]
    OperationFailed(E),

    /// Task execution crashed instead of returning
    #[error("Task execution crashed for {component}: {message}")]
    TaskPanicked { component: String, message: String },

    /// The breaker's control loop is no longer running
    #[error("Circuit breaker {component} has shut down")]
    Shutdown { component: String },
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::CircuitOpen { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CircuitBreakerError::Timeout { .. })
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, CircuitBreakerError::TaskPanicked { .. })
    }

    /// Whether this failure is evidence against the downstream and feeds the counter
    pub fn is_counted_failure(&self) -> bool {
        matches!(
            self,
            CircuitBreakerError::Timeout { .. }
                | CircuitBreakerError::OperationFailed(_)
                | CircuitBreakerError::TaskPanicked { .. }
        )
    }

    /// The task's own error, if that is what this is
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            CircuitBreakerError::OperationFailed(error) => Some(error),
            _ => None,
        }
    }
}

/// Messages processed, in arrival order, by the control loop
pub(crate) enum BreakerCommand<T, E> {
    Submit(TaskRequest<T, E>),
    TaskCompleted {
        call_id: Uuid,
        outcome: TaskOutcome<T, E>,
        reply_to: ReplyTo<T, E>,
    },
    BecomeHalfOpen {
        generation: u64,
    },
    GetMetrics {
        resp: oneshot::Sender<CircuitBreakerMetrics>,
    },
    ForceOpen {
        resp: oneshot::Sender<()>,
    },
    ForceClosed {
        resp: oneshot::Sender<()>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Handle to a running circuit breaker
///
/// Cloning the handle is cheap; every clone talks to the same control loop.
pub struct CircuitBreaker<T, E> {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    sender: mpsc::Sender<BreakerCommand<T, E>>,
}

impl<T, E> Clone for CircuitBreaker<T, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            config: self.config.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<T, E> fmt::Debug for CircuitBreaker<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

impl<T, E> CircuitBreaker<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Start the control loop for a new breaker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        let (sender, receiver) = mpsc::channel(config.command_buffer_size());

        info!(
            component = %name,
            max_fail_count = config.max_fail_count(),
            run_timeout_ms = config.run_timeout().as_millis(),
            reset_wait_ms = config.reset_wait().as_millis(),
            "🛡️ Circuit breaker initialized"
        );

        let processor =
            BreakerProcessor::new(name.clone(), config.clone(), sender.downgrade(), receiver);
        tokio::spawn(processor.run());

        Self {
            name,
            config,
            sender,
        }
    }

    /// Hand a request to the control loop.
    ///
    /// The outcome is delivered to the request's reply target. If the loop is
    /// gone the target immediately receives [`CircuitBreakerError::Shutdown`].
    pub async fn submit(&self, request: TaskRequest<T, E>) {
        if let Err(mpsc::error::SendError(BreakerCommand::Submit(request))) =
            self.sender.send(BreakerCommand::Submit(request)).await
        {
            warn!(component = %self.name, call_id = %request.call_id, "Submit after shutdown");
            request.reply_to.deliver(Err(CircuitBreakerError::Shutdown {
                component: self.name.to_string(),
            }));
        }
    }

    /// Current state as seen by the control loop
    pub async fn state(&self) -> Result<CircuitState> {
        Ok(self.metrics().await?.current_state)
    }

    /// Snapshot of the control state and call counters
    pub async fn metrics(&self) -> Result<CircuitBreakerMetrics> {
        self.request(|resp| BreakerCommand::GetMetrics { resp }).await
    }

    /// Force the circuit open and arm a fresh cool-down
    pub async fn force_open(&self) -> Result<()> {
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        self.request(|resp| BreakerCommand::ForceOpen { resp }).await
    }

    /// Force the circuit closed and cancel any pending cool-down
    pub async fn force_closed(&self) -> Result<()> {
        warn!(component = %self.name, "🚨 Circuit breaker forced closed");
        self.request(|resp| BreakerCommand::ForceClosed { resp }).await
    }

    /// Stop the control loop; later submissions fail with `Shutdown`
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|resp| BreakerCommand::Shutdown { resp }).await
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> BreakerCommand<T, E>,
    ) -> Result<R> {
        let (resp, rx) = oneshot::channel();
        self.sender
            .send(command(resp))
            .await
            .map_err(|_| self.unavailable())?;
        rx.await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> GuardError {
        GuardError::BreakerUnavailable(format!("control loop for {} is not running", self.name))
    }
}

impl<T, E> CircuitBreaker<T, E> {
    /// Component name for logging and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

/// The armed cool-down, tagged so a stale fire can be recognised
struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Owner of the state triple; runs as a dedicated tokio task
struct BreakerProcessor<T, E> {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    state: CircuitState,
    failure_count: u32,
    timer: Option<PendingTimer>,
    timer_generation: u64,
    metrics: CircuitBreakerMetrics,
    policy: SupervisionPolicy,
    /// Weak so that timers alone never keep the loop alive
    command_sender: mpsc::WeakSender<BreakerCommand<T, E>>,
    command_receiver: mpsc::Receiver<BreakerCommand<T, E>>,
}

impl<T, E> BreakerProcessor<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn new(
        name: Arc<str>,
        config: CircuitBreakerConfig,
        command_sender: mpsc::WeakSender<BreakerCommand<T, E>>,
        command_receiver: mpsc::Receiver<BreakerCommand<T, E>>,
    ) -> Self {
        Self {
            metrics: CircuitBreakerMetrics::new(name.to_string()),
            policy: SupervisionPolicy::new(name.clone()),
            name,
            config,
            state: CircuitState::Closed,
            failure_count: 0,
            timer: None,
            timer_generation: 0,
            command_sender,
            command_receiver,
        }
    }

    async fn run(mut self) {
        debug!(component = %self.name, "Circuit breaker control loop started");

        while let Some(command) = self.command_receiver.recv().await {
            if !self.handle_command(command) {
                break;
            }
        }

        self.cancel_timer();
        self.drain_after_shutdown().await;

        info!(component = %self.name, "Circuit breaker control loop stopped");
    }

    /// Returns `false` once shutdown has been requested
    fn handle_command(&mut self, command: BreakerCommand<T, E>) -> bool {
        match command {
            BreakerCommand::Submit(request) => self.handle_submit(request),
            BreakerCommand::TaskCompleted {
                call_id,
                outcome,
                reply_to,
            } => self.handle_completion(call_id, outcome, reply_to),
            BreakerCommand::BecomeHalfOpen { generation } => self.handle_timer_fired(generation),
            BreakerCommand::GetMetrics { resp } => {
                let _ = resp.send(self.snapshot());
            }
            BreakerCommand::ForceOpen { resp } => {
                self.transition_to(CircuitState::Open, "forced");
                let _ = resp.send(());
            }
            BreakerCommand::ForceClosed { resp } => {
                self.transition_to(CircuitState::Closed, "forced");
                let _ = resp.send(());
            }
            BreakerCommand::Shutdown { resp } => {
                info!(component = %self.name, state = %self.state, "Circuit breaker shutdown requested");
                let _ = resp.send(());
                return false;
            }
        }
        true
    }

    fn handle_submit(&mut self, request: TaskRequest<T, E>) {
        self.metrics.total_calls += 1;

        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => self.dispatch(request),
            CircuitState::Open => self.short_circuit(request),
        }
    }

    /// Answer without running the task; not counted as a failure
    fn short_circuit(&mut self, request: TaskRequest<T, E>) {
        let TaskRequest {
            call_id,
            fallback,
            reply_to,
            ..
        } = request;

        self.metrics.short_circuited += 1;
        let result = match fallback {
            Some(value) => {
                self.metrics.fallback_count += 1;
                Ok(value)
            }
            None => Err(CircuitBreakerError::CircuitOpen {
                component: self.name.to_string(),
            }),
        };

        debug!(
            component = %self.name,
            call_id = %call_id,
            fallback = result.is_ok(),
            "⚡ Call short-circuited"
        );
        reply_to.deliver(result);
    }

    fn dispatch(&mut self, request: TaskRequest<T, E>) {
        let TaskRequest {
            call_id,
            task,
            reply_to,
            ..
        } = request;

        debug!(
            component = %self.name,
            call_id = %call_id,
            state = %self.state,
            "Dispatching call to task runner"
        );

        let runner = TaskRunner::new(self.name.clone(), call_id);
        let policy = self.policy.clone();
        let deadline = self.config.run_timeout();
        let completions = self.command_sender.upgrade();

        tokio::spawn(async move {
            let outcome = policy.supervise(runner, task, deadline).await;
            let completed = BreakerCommand::TaskCompleted {
                call_id,
                outcome,
                reply_to,
            };

            let undelivered = match completions {
                Some(sender) => sender.send(completed).await.err().map(|e| e.0),
                None => Some(completed),
            };

            // Control loop is gone: answer the caller directly
            if let Some(BreakerCommand::TaskCompleted {
                outcome, reply_to, ..
            }) = undelivered
            {
                reply_to.deliver(outcome.into_result());
            }
        });
    }

    fn handle_completion(&mut self, call_id: Uuid, outcome: TaskOutcome<T, E>, reply_to: ReplyTo<T, E>) {
        match &outcome {
            TaskOutcome::Success(_) => self.record_success(call_id),
            TaskOutcome::Failure(error) => self.record_failure(call_id, error),
        }

        if !reply_to.deliver(outcome.into_result()) {
            debug!(component = %self.name, call_id = %call_id, "Caller no longer waiting for result");
        }
    }

    fn record_success(&mut self, call_id: Uuid) {
        self.metrics.success_count += 1;

        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                self.transition_to(CircuitState::Closed, "probe succeeded");
            }
            CircuitState::Open => {
                debug!(component = %self.name, call_id = %call_id, "Late success while open");
            }
        }
    }

    fn record_failure(&mut self, call_id: Uuid, error: &CircuitBreakerError<E>) {
        self.metrics.failure_total += 1;
        if error.is_timeout() {
            self.metrics.timeout_count += 1;
        }
        if error.is_panic() {
            self.metrics.panic_count += 1;
        }

        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                debug!(
                    component = %self.name,
                    call_id = %call_id,
                    failure_count = self.failure_count,
                    max_fail_count = self.config.max_fail_count(),
                    "Failure recorded"
                );
                if self.failure_count >= self.config.max_fail_count() {
                    self.transition_to(CircuitState::Open, "failure threshold reached");
                }
            }
            CircuitState::HalfOpen => {
                self.transition_to(CircuitState::Open, "probe failed");
            }
            CircuitState::Open => {
                debug!(component = %self.name, call_id = %call_id, "Late failure while open");
            }
        }
    }

    fn handle_timer_fired(&mut self, generation: u64) {
        let current = self.timer.as_ref().map(|timer| timer.generation);
        if self.state != CircuitState::Open || current != Some(generation) {
            debug!(
                component = %self.name,
                generation,
                state = %self.state,
                "Ignoring stale cool-down timer"
            );
            return;
        }

        self.timer = None;
        self.transition_to(CircuitState::HalfOpen, "cool-down elapsed");
    }

    fn transition_to(&mut self, next: CircuitState, reason: &str) {
        let previous = self.state;
        self.state = next;
        self.failure_count = 0;
        self.metrics.state_transitions += 1;
        self.metrics.last_transition_at = Some(Utc::now());

        match next {
            CircuitState::Open => self.arm_timer(),
            CircuitState::Closed => self.cancel_timer(),
            CircuitState::HalfOpen => {}
        }

        log_breaker_transition(&self.name, previous, next, reason);
    }

    /// Replace any pending cool-down with a fresh one
    fn arm_timer(&mut self) {
        self.cancel_timer();

        self.timer_generation += 1;
        let generation = self.timer_generation;
        let reset_wait = self.config.reset_wait();
        let sender = self.command_sender.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(reset_wait).await;
            if let Some(sender) = sender.upgrade() {
                let _ = sender.send(BreakerCommand::BecomeHalfOpen { generation }).await;
            }
        });

        self.timer = Some(PendingTimer { generation, handle });
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }

    fn snapshot(&self) -> CircuitBreakerMetrics {
        let mut snapshot = self.metrics.clone();
        snapshot.current_state = self.state;
        snapshot.failure_count = self.failure_count;
        snapshot
    }

    /// Answer everything still queued so no caller is left waiting
    async fn drain_after_shutdown(&mut self) {
        self.command_receiver.close();

        while let Some(command) = self.command_receiver.recv().await {
            match command {
                BreakerCommand::Submit(request) => {
                    request.reply_to.deliver(Err(CircuitBreakerError::Shutdown {
                        component: self.name.to_string(),
                    }));
                }
                BreakerCommand::TaskCompleted {
                    outcome, reply_to, ..
                } => {
                    reply_to.deliver(outcome.into_result());
                }
                BreakerCommand::GetMetrics { resp } => {
                    let _ = resp.send(self.snapshot());
                }
                BreakerCommand::ForceOpen { resp }
                | BreakerCommand::ForceClosed { resp }
                | BreakerCommand::Shutdown { resp } => {
                    let _ = resp.send(());
                }
                BreakerCommand::BecomeHalfOpen { .. } => {}
            }
        }
    }
}
