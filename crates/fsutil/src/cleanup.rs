//! Cleanup helpers for cancelled or failed downloads.

use rawpull_errors::{Error, StorageError};
use std::path::Path;

/// Remove a staging file or directory tree, ignoring a missing path.
///
/// Used when a download is cancelled or fails after staging has begun: the
/// staging entry never became a cache entry, so there's nothing for a caller
/// to roll back beyond deleting it.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub async fn remove_staging(path: &Path) -> Result<(), Error> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::from(StorageError::from_io_with_path(&e, path))),
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::from(StorageError::from_io_with_path(&e, path))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removing_missing_path_is_a_no_op() {
        remove_staging(Path::new("/nonexistent/rawpull-cleanup-test"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn removes_staging_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        remove_staging(&path).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn removes_staging_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        tokio::fs::create_dir(&nested).await.unwrap();
        tokio::fs::write(nested.join("file"), b"x").await.unwrap();

        remove_staging(dir.path()).await.unwrap();
        assert!(!dir.path().exists());
    }
}
