//! Network-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

const HINT_CHECK_CONNECTION: &str = "Check your network connection and retry.";

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum NetworkError {
    #[error("connection timeout to {url}")]
    Timeout { url: String },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error {status} for {url}: {message}")]
    HttpError {
        status: u16,
        url: String,
        message: String,
    },

    #[error("unexpected informational response {status} for {url}")]
    UnexpectedInformational { status: u16, url: String },

    #[error("network unavailable")]
    NetworkUnavailable,

    #[error("rate limited: retry after {seconds} seconds")]
    RateLimited { seconds: u64 },

    #[error("content length mismatch: declared {declared}, received {received}")]
    DownloadTruncated { declared: u64, received: u64 },

    #[error("no data received for {url}")]
    NoDataReceived { url: String },

    #[error("unsupported protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },
}

impl UserFacingError for NetworkError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { .. } | Self::NetworkUnavailable => Some(HINT_CHECK_CONNECTION),
            Self::RateLimited { .. } => Some("Wait for the rate limit window to expire."),
            Self::DownloadTruncated { .. } | Self::NoDataReceived { .. } => {
                Some("The server closed the connection early; retry the pull.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::DownloadFailed(_)
                | Self::ConnectionRefused(_)
                | Self::NetworkUnavailable
                | Self::RateLimited { .. }
                | Self::DownloadTruncated { .. }
                | Self::NoDataReceived { .. }
        )
    }
}
