use std::fmt;

use crate::config::ConfigurationError;

#[derive(Debug, Clone, PartialEq)]
pub enum GuardError {
    ConfigurationError(String),
    BreakerUnavailable(String),
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            GuardError::BreakerUnavailable(msg) => write!(f, "Circuit breaker unavailable: {msg}"),
        }
    }
}

impl std::error::Error for GuardError {}

impl From<ConfigurationError> for GuardError {
    fn from(err: ConfigurationError) -> Self {
        GuardError::ConfigurationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;
