#![allow(clippy::doc_markdown)] // Allow technical terms like HalfOpen, YAML in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Circuit Guard
//!
//! Circuit-breaker supervisor protecting a caller from a chronically failing
//! or slow asynchronous operation.
//!
//! ## Overview
//!
//! A breaker counts consecutive failures of the task it guards. Once
//! `max_fail_count` is reached it stops invoking the task for `reset_wait`,
//! answering with [`CircuitBreakerError::CircuitOpen`] or a precomputed
//! fallback instead. After the cool-down calls are let through as probes; the
//! first probe outcome either closes the gate again or re-opens it.
//!
//! ## Module Organization
//!
//! - [`resilience`] - Breaker control loop, task runner and supervision policy
//! - [`client`] - Submission helpers (plain, with fallback, on behalf of a third party)
//! - [`config`] - YAML configuration with environment overrides
//! - [`logging`] - Structured `tracing` setup
//! - [`error`] - Crate-level error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use circuit_guard::{BreakerClient, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! circuit_guard::logging::init_structured_logging();
//!
//! let config = CircuitBreakerConfig::new(3, Duration::from_millis(50), Duration::from_millis(100))?;
//! let client = BreakerClient::<u64, std::io::Error>::spawn("pricing", config);
//!
//! match client.submit(|| async { Ok(1999) }).await {
//!     Ok(price) => println!("price: {price}"),
//!     Err(e) if e.is_circuit_open() => println!("pricing unavailable, try later"),
//!     Err(e) => println!("pricing failed: {e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod resilience;

pub use client::BreakerClient;
pub use config::{BreakerSettings, ConfigManager, ConfigurationError, GuardConfig};
pub use error::{GuardError, Result};
pub use resilience::{
    CallResult, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerMetrics,
    CircuitState, ReplyTo, TaskOutcome, TaskRequest,
};
