#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Low-level filesystem helpers for the raw disk-image importer.
//!
//! These are the small, independently testable primitives the import
//! session's Finalize step composes: a sparse-aware writer, copy-on-write
//! suppression, provenance tagging, staging-name generation, cleanup, and
//! the cache filename escaping scheme.

pub mod cleanup;
pub mod naming;
pub mod nocow;
pub mod provenance;
pub mod sparse;
pub mod tempname;
pub mod timestamps;

use rawpull_errors::{Error, StorageError};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Apply the fixed, read-only mode used for finalized cache entries.
///
/// # Errors
///
/// Returns an error if the file's permissions cannot be changed.
pub async fn chmod_readonly(path: &Path, mode: u32) -> Result<(), Error> {
    let permissions = std::fs::Permissions::from_mode(mode);
    tokio::fs::set_permissions(path, permissions)
        .await
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, path)))
}

/// Atomically move a staged file into its final cache location.
///
/// # Errors
///
/// Returns an error if the rename fails, e.g. because the staging and
/// destination paths live on different filesystems.
pub async fn atomic_rename(from: &Path, to: &Path) -> Result<(), Error> {
    tokio::fs::rename(from, to).await.map_err(|e| {
        Error::from(StorageError::AtomicRenameFailed {
            message: format!("{} -> {}: {e}", from.display(), to.display()),
        })
    })
}

/// Ensure a directory exists, creating all missing parents.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub async fn ensure_dir(path: &Path) -> Result<(), Error> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, path)))
}
