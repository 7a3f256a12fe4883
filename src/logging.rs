//! # Structured Logging Module
//!
//! Environment-aware structured logging built on `tracing-subscriber`.
//! Human-readable output by default, JSON lines when configured.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{ConfigManager, LoggingConfig};
use crate::resilience::CircuitState;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment defaults
pub fn init_structured_logging() {
    init_structured_logging_with(&LoggingConfig::default());
}

/// Initialize structured logging from the `logging` section of the configuration.
///
/// Only the first call has any effect. An already-installed global
/// subscriber (e.g. from a test harness) is left in place.
pub fn init_structured_logging_with(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = ConfigManager::detect_environment();
        let directive = config
            .level
            .clone()
            .unwrap_or_else(|| default_log_level(&environment).to_string());
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

        let init_result = if config.json {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_filter(filter),
                )
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_filter(filter),
                )
                .try_init()
        };

        if init_result.is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            environment = %environment,
            json = config.json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log a circuit state change with consistent structured fields
pub fn log_breaker_transition(component: &str, from: CircuitState, to: CircuitState, reason: &str) {
    match to {
        CircuitState::Open => tracing::error!(
            component = %component,
            from = %from,
            to = %to,
            reason = %reason,
            "🔴 Circuit breaker opened (failing fast)"
        ),
        CircuitState::HalfOpen => tracing::info!(
            component = %component,
            from = %from,
            to = %to,
            reason = %reason,
            "🟡 Circuit breaker half-open (testing recovery)"
        ),
        CircuitState::Closed => tracing::info!(
            component = %component,
            from = %from,
            to = %to,
            reason = %reason,
            "🟢 Circuit breaker closed (recovered)"
        ),
    }
}
