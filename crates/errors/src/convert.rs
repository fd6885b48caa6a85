//! Errors surfaced by the COW container probe/convert collaborator

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConvertError {
    #[error("failed to probe image format: {message}")]
    ProbeFailed { message: String },

    #[error("failed to convert COW container to raw: {message}")]
    ConvertFailed { message: String },

    #[error("conversion helper not found: {tool}")]
    ToolNotFound { tool: String },
}

impl UserFacingError for ConvertError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ToolNotFound { .. } => Some("Install the COW conversion helper and retry."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        false
    }
}
