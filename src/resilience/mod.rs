//! # Resilience Module
//!
//! Circuit-breaker supervision for a single failing or slow async operation.
//!
//! ## Architecture
//!
//! - **Circuit Breaker**: control loop owning the Closed / Open / HalfOpen
//!   state, the consecutive-failure counter and the cool-down timer
//! - **Task Runner**: executes one task under the run timeout
//! - **Supervision Policy**: turns runner crashes into ordinary failures
//! - **Metrics**: counters and state snapshot read through the control loop
//!
//! ## Usage
//!
//! ```rust,no_run
//! use circuit_guard::resilience::{boxed_task, CircuitBreaker, CircuitBreakerConfig, TaskRequest};
//! use std::time::Duration;
//! use tokio::sync::oneshot;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CircuitBreakerConfig::new(3, Duration::from_millis(50), Duration::from_millis(100))?;
//! let breaker = CircuitBreaker::<&str, String>::spawn("inventory", config);
//!
//! let (tx, rx) = oneshot::channel();
//! let task = boxed_task(|| async { Ok::<_, String>("in stock") });
//! breaker.submit(TaskRequest::new(task, tx)).await;
//!
//! let result = rx.await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod metrics;
pub mod supervision;
pub mod task;
pub mod task_runner;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use config::CircuitBreakerConfig;
pub use metrics::CircuitBreakerMetrics;
pub use supervision::SupervisionPolicy;
pub use task::{boxed_task, BoxedTask, CallResult, ReplyTo, TaskOutcome, TaskRequest};
pub use task_runner::TaskRunner;
