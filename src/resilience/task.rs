//! Units of work flowing through a circuit breaker.
//!
//! A [`TaskRequest`] is built fresh for every call and consumed exactly once.
//! It carries the task, an optional fallback, and the [`ReplyTo`] target that
//! eventually receives the single [`CallResult`] for that call.

use std::fmt;
use std::future::Future;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::circuit_breaker::CircuitBreakerError;

/// Deferred task: invoked at most once, only when the gate lets the call through
pub type BoxedTask<T, E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, E>> + Send + 'static>;

/// What a caller ultimately receives for one submitted call
pub type CallResult<T, E> = Result<T, CircuitBreakerError<E>>;

/// Box a task closure so it can be carried through the command channel
pub fn boxed_task<F, Fut, T, E>(task: F) -> BoxedTask<T, E>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    Box::new(move || task().boxed())
}

/// Identity of the caller a result is relayed to
pub enum ReplyTo<T, E> {
    /// The submitter itself, waiting on a oneshot
    Caller(oneshot::Sender<CallResult<T, E>>),
    /// A third party listening on its own channel
    Channel(mpsc::UnboundedSender<CallResult<T, E>>),
}

impl<T, E> ReplyTo<T, E> {
    /// Deliver the result, consuming the reply target.
    ///
    /// Returns `false` when the receiving side has already gone away.
    pub fn deliver(self, result: CallResult<T, E>) -> bool {
        match self {
            ReplyTo::Caller(sender) => sender.send(result).is_ok(),
            ReplyTo::Channel(sender) => sender.send(result).is_ok(),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            ReplyTo::Caller(sender) => sender.is_closed(),
            ReplyTo::Channel(sender) => sender.is_closed(),
        }
    }
}

impl<T, E> fmt::Debug for ReplyTo<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyTo::Caller(_) => f.write_str("ReplyTo::Caller"),
            ReplyTo::Channel(_) => f.write_str("ReplyTo::Channel"),
        }
    }
}

impl<T, E> From<oneshot::Sender<CallResult<T, E>>> for ReplyTo<T, E> {
    fn from(sender: oneshot::Sender<CallResult<T, E>>) -> Self {
        ReplyTo::Caller(sender)
    }
}

impl<T, E> From<mpsc::UnboundedSender<CallResult<T, E>>> for ReplyTo<T, E> {
    fn from(sender: mpsc::UnboundedSender<CallResult<T, E>>) -> Self {
        ReplyTo::Channel(sender)
    }
}

/// A submitted unit of work
pub struct TaskRequest<T, E> {
    pub(crate) call_id: Uuid,
    pub(crate) task: BoxedTask<T, E>,
    pub(crate) fallback: Option<T>,
    pub(crate) reply_to: ReplyTo<T, E>,
}

impl<T, E> TaskRequest<T, E> {
    pub fn new(task: BoxedTask<T, E>, reply_to: impl Into<ReplyTo<T, E>>) -> Self {
        Self {
            call_id: Uuid::new_v4(),
            task,
            fallback: None,
            reply_to: reply_to.into(),
        }
    }

    /// Value returned as a success, without running the task, while the circuit is open
    pub fn with_fallback(mut self, fallback: T) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

impl<T, E> fmt::Debug for TaskRequest<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRequest")
            .field("call_id", &self.call_id)
            .field("has_fallback", &self.fallback.is_some())
            .field("reply_to", &self.reply_to)
            .finish()
    }
}

/// Result of one task execution as seen by the breaker
#[derive(Debug)]
pub enum TaskOutcome<T, E> {
    Success(T),
    Failure(CircuitBreakerError<E>),
}

impl<T, E> TaskOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    pub fn into_result(self) -> CallResult<T, E> {
        match self {
            TaskOutcome::Success(value) => Ok(value),
            TaskOutcome::Failure(error) => Err(error),
        }
    }
}
