//! Storage and filesystem-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum StorageError {
    #[error("disk full: {path}")]
    DiskFull { path: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("directory not found: {path}")]
    DirectoryNotFound { path: std::path::PathBuf },

    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    #[error("atomic rename failed: {message}")]
    AtomicRenameFailed { message: String },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: String::new(),
            },
            std::io::ErrorKind::NotFound => Self::PathNotFound {
                path: String::new(),
            },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists {
                path: String::new(),
            },
            _ => Self::IoError {
                message: err.to_string(),
            },
        }
    }
}

impl StorageError {
    /// Convert an `io::Error` into a `StorageError` with an associated path
    #[must_use]
    pub fn from_io_with_path(err: &std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::NotFound => Self::PathNotFound {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists {
                path: path.display().to_string(),
            },
            _ => Self::IoError {
                message: format!("{}: {}", path.display(), err),
            },
        }
    }
}

impl UserFacingError for StorageError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::DiskFull { .. } => Some("Free up disk space under the image root and retry."),
            Self::PermissionDenied { .. } => {
                Some("Adjust filesystem permissions or retry with elevated privileges.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::IoError { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::DiskFull { .. } => "storage.disk_full",
            Self::PermissionDenied { .. } => "storage.permission_denied",
            Self::PathNotFound { .. } => "storage.path_not_found",
            Self::DirectoryNotFound { .. } => "storage.directory_not_found",
            Self::AlreadyExists { .. } => "storage.already_exists",
            Self::IoError { .. } => "storage.io_error",
            Self::InvalidPath { .. } => "storage.invalid_path",
            Self::AtomicRenameFailed { .. } => "storage.atomic_rename_failed",
        };
        Some(code)
    }
}
