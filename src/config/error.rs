//! Configuration errors

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Configuration file not found, searched: {searched_paths:?}")]
    ConfigFileNotFound { searched_paths: Vec<PathBuf> },

    #[error("Failed to read configuration file {path}: {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file {path} exceeds {limit} bytes")]
    FileTooLarge { path: String, limit: u64 },

    #[error("Invalid YAML in {path}: {message}")]
    InvalidYaml { path: String, message: String },

    #[error("Invalid value for {field}: {message}")]
    ValidationError { field: String, message: String },
}

impl ConfigurationError {
    pub fn file_read_error(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileReadError {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_yaml(path: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidYaml {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;
