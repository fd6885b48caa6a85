//! Materializing a writable local copy alongside a read-only cache entry.

use rawpull_errors::{Error, StorageError};
use rawpull_fsutil::{cleanup, nocow, provenance, tempname, timestamps};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Copy `source` (a finalized, read-only cache entry) to
/// `image_root/<local>.raw`, creating it atomically.
///
/// If `force` is set, whatever currently exists at the destination is
/// removed first. Timestamps and provenance extended attributes are copied
/// best-effort; neither failure aborts the materialization.
///
/// # Errors
///
/// Returns an error if the source can't be read, the destination can't be
/// created, the copy fails partway, or the final rename fails.
pub async fn materialize(
    image_root: &Path,
    source: &Path,
    local: &str,
    force: bool,
) -> Result<PathBuf, Error> {
    let destination = image_root.join(format!("{local}.raw"));

    if force {
        cleanup::remove_staging(&destination).await?;
    }

    let staging = tempname::staging_path(image_root);
    let mut dst_file = open_staging(&staging).await?;

    nocow::disable_cow(&staging)?;

    let mut src_file = tokio::fs::File::open(source)
        .await
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, source)))?;

    tokio::io::copy(&mut src_file, &mut dst_file)
        .await
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, &staging)))?;
    dst_file
        .flush()
        .await
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, &staging)))?;
    drop(dst_file);

    let _ = timestamps::copy_mtime(source, &staging);
    if let Some(url) = provenance::read_source_url(source) {
        let etag = provenance::read_source_etag(source);
        let _ = provenance::tag_source(&staging, &url, etag.as_deref());
    }

    if let Err(e) = rawpull_fsutil::atomic_rename(&staging, &destination).await {
        let _ = cleanup::remove_staging(&staging).await;
        return Err(e);
    }

    Ok(destination)
}

#[cfg(unix)]
async fn open_staging(path: &Path) -> Result<tokio::fs::File, Error> {
    tokio::fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .mode(0o664)
        .open(path)
        .await
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, path)))
}

#[cfg(not(unix))]
async fn open_staging(path: &Path) -> Result<tokio::fs::File, Error> {
    tokio::fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .await
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copies_source_bytes_to_named_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.raw");
        tokio::fs::write(&source, b"disk image bytes").await.unwrap();

        let destination = materialize(dir.path(), &source, "my-vm", false)
            .await
            .unwrap();

        assert_eq!(destination, dir.path().join("my-vm.raw"));
        assert_eq!(
            tokio::fs::read(&destination).await.unwrap(),
            b"disk image bytes"
        );
    }

    #[tokio::test]
    async fn force_replaces_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.raw");
        tokio::fs::write(&source, b"new bytes").await.unwrap();

        let existing = dir.path().join("my-vm.raw");
        tokio::fs::write(&existing, b"stale bytes").await.unwrap();

        materialize(dir.path(), &source, "my-vm", true)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&existing).await.unwrap(), b"new bytes");
    }

    #[tokio::test]
    async fn carries_provenance_xattrs_from_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.raw");
        tokio::fs::write(&source, b"x").await.unwrap();
        provenance::tag_source(&source, "https://example.com/disk.raw.xz", Some("v1")).unwrap();

        let destination = materialize(dir.path(), &source, "tagged", false)
            .await
            .unwrap();

        assert_eq!(
            provenance::read_source_url(&destination),
            Some("https://example.com/disk.raw.xz".to_string())
        );
    }
}
