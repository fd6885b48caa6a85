#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the raw disk-image importer
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement `Clone` where possible for easier handling.

pub mod config;
pub mod convert;
pub mod import;
pub mod network;
pub mod storage;

// Re-export all error types at the root
pub use config::ConfigError;
pub use convert::ConvertError;
pub use import::ImportError;
pub use network::NetworkError;
pub use storage::StorageError;

use std::borrow::Cow;
use thiserror::Error;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("import error: {0}")]
    Import(#[from] ImportError),

    #[error("convert error: {0}")]
    Convert(#[from] ConvertError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {message}")]
    Io {
        #[cfg_attr(feature = "serde", serde(with = "io_kind_as_str"))]
        kind: std::io::ErrorKind,
        message: String,
        #[cfg_attr(feature = "serde", serde(with = "opt_path_buf"))]
        path: Option<std::path::PathBuf>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

/// Result type alias for raw disk-image importer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Shared trait implemented by each domain error enum so that callers
/// (progress reporting, CLI surfaces, structured logs) can treat every
/// error kind uniformly without matching on the top-level [`Error`].
pub trait UserFacingError {
    /// A message suitable for direct display to an operator.
    fn user_message(&self) -> Cow<'_, str>;

    /// An optional short remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether the caller may reasonably retry the operation that produced
    /// this error. The core itself never retries (see §7 propagation
    /// policy); this is informational for callers that do.
    fn is_retryable(&self) -> bool {
        false
    }

    /// A stable machine-readable code, when one has been assigned.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

// Serde helper modules for optional path and io::ErrorKind as string
#[cfg(feature = "serde")]
mod io_kind_as_str {
    use serde::{Deserialize, Deserializer, Serializer};
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S>(kind: &std::io::ErrorKind, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&format!("{kind:?}"))
    }
    pub fn deserialize<'de, D>(deserializer: D) -> Result<std::io::ErrorKind, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "NotFound" => std::io::ErrorKind::NotFound,
            "PermissionDenied" => std::io::ErrorKind::PermissionDenied,
            "ConnectionRefused" => std::io::ErrorKind::ConnectionRefused,
            "ConnectionReset" => std::io::ErrorKind::ConnectionReset,
            "ConnectionAborted" => std::io::ErrorKind::ConnectionAborted,
            "NotConnected" => std::io::ErrorKind::NotConnected,
            "AddrInUse" => std::io::ErrorKind::AddrInUse,
            "AddrNotAvailable" => std::io::ErrorKind::AddrNotAvailable,
            "BrokenPipe" => std::io::ErrorKind::BrokenPipe,
            "AlreadyExists" => std::io::ErrorKind::AlreadyExists,
            "WouldBlock" => std::io::ErrorKind::WouldBlock,
            "InvalidInput" => std::io::ErrorKind::InvalidInput,
            "InvalidData" => std::io::ErrorKind::InvalidData,
            "TimedOut" => std::io::ErrorKind::TimedOut,
            "WriteZero" => std::io::ErrorKind::WriteZero,
            "Interrupted" => std::io::ErrorKind::Interrupted,
            "Unsupported" => std::io::ErrorKind::Unsupported,
            "UnexpectedEof" => std::io::ErrorKind::UnexpectedEof,
            _ => std::io::ErrorKind::Other,
        })
    }
}

#[cfg(feature = "serde")]
mod opt_path_buf {
    use serde::{Deserialize, Deserializer, Serializer};
    #[allow(clippy::ref_option)]
    pub fn serialize<S>(path: &Option<std::path::PathBuf>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match path {
            Some(pb) => s.serialize_some(&pb.display().to_string()),
            None => s.serialize_none(),
        }
    }
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<std::path::PathBuf>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<String>::deserialize(deserializer)?;
        Ok(opt.map(std::path::PathBuf::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_converts_into_error() {
        let net_err = NetworkError::Timeout {
            url: "https://example.com".into(),
        };
        let err: Error = net_err.into();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn storage_error_display() {
        let err = StorageError::DiskFull {
            path: "/var/lib/images".into(),
        };
        assert_eq!(err.to_string(), "disk full: /var/lib/images");
    }

    #[test]
    fn io_error_roundtrips_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(
            err,
            Error::Io {
                kind: std::io::ErrorKind::PermissionDenied,
                ..
            }
        ));
    }
}
