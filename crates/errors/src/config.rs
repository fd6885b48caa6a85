//! Configuration loading/validation errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("failed to parse config: {message}")]
    ParseError { message: String },

    #[error("failed to write config to {path}: {error}")]
    WriteError { path: String, error: String },

    #[error("failed to serialize config: {error}")]
    SerializeError { error: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ParseError { .. } | Self::InvalidValue { .. } => {
                Some("Check the config file's TOML syntax and field values.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        false
    }
}
