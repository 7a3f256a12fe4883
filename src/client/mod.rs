//! # Breaker Client
//!
//! Call-submission helpers over [`CircuitBreaker`]. The client holds no state
//! of its own; every method builds a fresh [`TaskRequest`] and either waits
//! for the single result or hands the reply target to a third party.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use circuit_guard::client::BreakerClient;
//! use circuit_guard::resilience::CircuitBreakerConfig;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CircuitBreakerConfig::new(3, Duration::from_millis(50), Duration::from_millis(100))?;
//! let client = BreakerClient::<String, String>::spawn("quotes", config);
//!
//! // Propagates CircuitOpen / Timeout / the task's own error
//! let quote = client.submit(|| async { Ok("42.10".to_string()) }).await;
//!
//! // Never fails: falls back to the cached value instead
//! let quote = client
//!     .submit_with_fallback(|| async { Ok("42.10".to_string()) }, "cached".to_string())
//!     .await;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;

use tokio::sync::oneshot;
use tracing::debug;

use crate::config::GuardConfig;
use crate::resilience::{
    boxed_task, CallResult, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, ReplyTo,
    TaskRequest,
};

pub struct BreakerClient<T, E> {
    breaker: CircuitBreaker<T, E>,
}

impl<T, E> Clone for BreakerClient<T, E> {
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
        }
    }
}

impl<T, E> fmt::Debug for BreakerClient<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerClient")
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl<T, E> BreakerClient<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(breaker: CircuitBreaker<T, E>) -> Self {
        Self { breaker }
    }

    /// Spawn a breaker and wrap it in a client
    pub fn spawn(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::new(CircuitBreaker::spawn(name, config))
    }

    /// Spawn a breaker using the settings `config` resolves for `name`
    pub fn from_config(name: impl Into<String>, config: &GuardConfig) -> crate::Result<Self> {
        let name = name.into();
        let breaker_config = config.settings_for(&name).to_breaker_config()?;
        Ok(Self::spawn(name, breaker_config))
    }

    pub fn breaker(&self) -> &CircuitBreaker<T, E> {
        &self.breaker
    }

    /// Run `task` through the breaker and wait for its outcome
    pub async fn submit<F, Fut>(&self, task: F) -> CallResult<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.breaker
            .submit(TaskRequest::new(boxed_task(task), tx))
            .await;
        self.await_reply(rx).await
    }

    /// Run `task` through the breaker; never fails.
    ///
    /// While the circuit is open `fallback` is returned without running the
    /// task. Any other failure is also replaced by `fallback`, after it has
    /// been counted by the breaker.
    pub async fn submit_with_fallback<F, Fut>(&self, task: F, fallback: T) -> T
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Clone,
        E: fmt::Debug,
    {
        let (tx, rx) = oneshot::channel();
        let request = TaskRequest::new(boxed_task(task), tx).with_fallback(fallback.clone());
        let call_id = request.call_id();
        self.breaker.submit(request).await;

        match self.await_reply(rx).await {
            Ok(value) => value,
            Err(error) => {
                debug!(
                    component = %self.breaker.name(),
                    call_id = %call_id,
                    error = ?error,
                    "Substituting fallback for failed call"
                );
                fallback
            }
        }
    }

    /// Run `task` on behalf of another caller; the result goes to `reply_to`
    pub async fn submit_for<F, Fut>(&self, task: F, reply_to: impl Into<ReplyTo<T, E>>)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.breaker
            .submit(TaskRequest::new(boxed_task(task), reply_to))
            .await;
    }

    async fn await_reply(&self, rx: oneshot::Receiver<CallResult<T, E>>) -> CallResult<T, E> {
        rx.await.unwrap_or_else(|_| {
            Err(CircuitBreakerError::Shutdown {
                component: self.breaker.name().to_string(),
            })
        })
    }
}
