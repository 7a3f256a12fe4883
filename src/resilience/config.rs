//! Runtime thresholds for a single circuit breaker

use std::time::Duration;

use crate::config::{ConfigResult, ConfigurationError};

const DEFAULT_COMMAND_BUFFER_SIZE: usize = 64;

/// Validated, immutable thresholds supplied at breaker construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    max_fail_count: u32,
    run_timeout: Duration,
    reset_wait: Duration,
    command_buffer_size: usize,
}

impl CircuitBreakerConfig {
    /// Build a configuration, rejecting a zero threshold or zero durations
    pub fn new(max_fail_count: u32, run_timeout: Duration, reset_wait: Duration) -> ConfigResult<Self> {
        let config = Self {
            max_fail_count,
            run_timeout,
            reset_wait,
            command_buffer_size: DEFAULT_COMMAND_BUFFER_SIZE,
        };
        config.validate()?;
        Ok(config)
    }

    /// Override the command channel capacity; zero is rejected
    pub fn with_command_buffer_size(mut self, command_buffer_size: usize) -> ConfigResult<Self> {
        self.command_buffer_size = command_buffer_size;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_fail_count == 0 {
            return Err(ConfigurationError::validation("max_fail_count", "must be at least 1"));
        }
        if self.run_timeout.is_zero() {
            return Err(ConfigurationError::validation("run_timeout", "must be greater than zero"));
        }
        if self.reset_wait.is_zero() {
            return Err(ConfigurationError::validation("reset_wait", "must be greater than zero"));
        }
        if self.command_buffer_size == 0 {
            return Err(ConfigurationError::validation(
                "command_buffer_size",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Consecutive failures while closed that open the circuit
    pub fn max_fail_count(&self) -> u32 {
        self.max_fail_count
    }

    /// Hard deadline for one task execution
    pub fn run_timeout(&self) -> Duration {
        self.run_timeout
    }

    /// Cool-down spent in the open state before a probe is allowed
    pub fn reset_wait(&self) -> Duration {
        self.reset_wait
    }

    pub fn command_buffer_size(&self) -> usize {
        self.command_buffer_size
    }
}
