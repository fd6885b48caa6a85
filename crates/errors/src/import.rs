//! Errors raised by the disk-image import state machine itself
//!
//! These are distinct from [`crate::NetworkError`] and [`crate::StorageError`]:
//! they cover invariant violations and policy limits that belong to the
//! download/session layer rather than to the transport or the filesystem.

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ImportError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("a download for {url} is already in progress")]
    AlreadyInProgress { url: String },

    #[error("counter overflow while tracking {what}")]
    Overflow { what: String },

    #[error("downloaded image exceeds the {limit}-byte cap ({size} bytes)")]
    TooLarge { size: u64, limit: u64 },

    #[error("callback arrived after the download for {url} was already finalized")]
    Stale { url: String },

    #[error("event loop could not be initialized: {message}")]
    EventLoopInit { message: String },
}

impl UserFacingError for ImportError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::TooLarge { .. } => Some("Raise the size cap or pick a smaller image."),
            Self::AlreadyInProgress { .. } => {
                Some("Wait for the existing pull to finish, or cancel it first.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        false
    }
}
