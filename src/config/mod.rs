//! # Circuit Guard Configuration
//!
//! YAML-backed settings for circuit breakers. A single file holds the base
//! configuration plus optional `development` / `test` / `production` sections
//! that are merged over the base for the detected environment.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use circuit_guard::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! circuit_guard::logging::init_structured_logging_with(&manager.config().logging);
//!
//! let settings = manager.config().settings_for("payments_api");
//! let breaker_config = settings.to_breaker_config()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::resilience::CircuitBreakerConfig;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring circuit-guard.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GuardConfig {
    /// Breaker thresholds, default plus per-component overrides
    #[serde(default)]
    pub breakers: BreakersConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Environment the configuration was resolved for
    #[serde(default)]
    pub environment: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BreakersConfig {
    /// Settings used by any component without an explicit entry
    #[serde(default)]
    pub default: BreakerSettings,

    /// Specific settings for named components
    #[serde(default)]
    pub components: HashMap<String, BreakerSettings>,
}

/// Thresholds for one guarded operation, as written in YAML
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BreakerSettings {
    /// Consecutive failures (while closed) that open the circuit
    pub max_fail_count: u32,

    /// Deadline for a single task execution in milliseconds
    pub run_timeout_ms: u64,

    /// Cool-down in the open state before a probe is allowed, in milliseconds
    pub reset_wait_ms: u64,

    /// Capacity of the breaker's command channel
    #[serde(default = "default_command_buffer_size")]
    pub command_buffer_size: usize,
}

fn default_command_buffer_size() -> usize {
    64
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            max_fail_count: 5,
            run_timeout_ms: 5_000,
            reset_wait_ms: 30_000,
            command_buffer_size: default_command_buffer_size(),
        }
    }
}

impl BreakerSettings {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    pub fn reset_wait(&self) -> Duration {
        Duration::from_millis(self.reset_wait_ms)
    }

    /// Convert to the runtime configuration, validating every threshold
    pub fn to_breaker_config(&self) -> ConfigResult<CircuitBreakerConfig> {
        CircuitBreakerConfig::new(self.max_fail_count, self.run_timeout(), self.reset_wait())?
            .with_command_buffer_size(self.command_buffer_size)
    }
}

/// The `logging` section. Loading the configuration does not install a
/// subscriber; pass this to [`crate::logging::init_structured_logging_with`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "circuit_guard=debug"
    pub level: Option<String>,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl GuardConfig {
    /// Get settings for a specific component, falling back to the default
    pub fn settings_for(&self, component_name: &str) -> BreakerSettings {
        self.breakers
            .components
            .get(component_name)
            .cloned()
            .unwrap_or_else(|| self.breakers.default.clone())
    }

    /// Validate the default and every component entry
    pub fn validate(&self) -> ConfigResult<()> {
        validate_settings("breakers.default", &self.breakers.default)?;
        for (name, settings) in &self.breakers.components {
            validate_settings(&format!("breakers.components.{name}"), settings)?;
        }
        Ok(())
    }
}

fn validate_settings(prefix: &str, settings: &BreakerSettings) -> ConfigResult<()> {
    if settings.max_fail_count == 0 {
        return Err(ConfigurationError::validation(
            format!("{prefix}.max_fail_count"),
            "must be at least 1",
        ));
    }
    if settings.run_timeout_ms == 0 {
        return Err(ConfigurationError::validation(
            format!("{prefix}.run_timeout_ms"),
            "must be greater than zero",
        ));
    }
    if settings.reset_wait_ms == 0 {
        return Err(ConfigurationError::validation(
            format!("{prefix}.reset_wait_ms"),
            "must be greater than zero",
        ));
    }
    if settings.command_buffer_size == 0 {
        return Err(ConfigurationError::validation(
            format!("{prefix}.command_buffer_size"),
            "must be at least 1",
        ));
    }
    Ok(())
}
