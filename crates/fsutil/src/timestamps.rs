//! Copying a source's modification time onto a finalized or materialized file.
//!
//! The server's `Last-Modified` header (or, for the writable local copy, the
//! cache entry's own mtime) is the only timestamp worth preserving; both
//! access and modification time are set together since nothing downstream
//! distinguishes them.

use filetime::FileTime;
use rawpull_errors::{Error, StorageError};
use std::path::Path;
use std::time::SystemTime;

/// Set both atime and mtime on `path` from an HTTP `Last-Modified` instant.
///
/// Best-effort by convention of its callers: failures here must never fail a
/// download, so callers should log and ignore the `Err` rather than propagate
/// it through the finalize sequence.
///
/// # Errors
///
/// Returns an error if the underlying `utimes` call fails.
pub fn set_mtime(path: &Path, mtime: SystemTime) -> Result<(), Error> {
    let ft = FileTime::from_system_time(mtime);
    filetime::set_file_times(path, ft, ft)
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, path)))
}

/// Copy atime/mtime from `src` onto `dst`, used when materializing a
/// writable local copy alongside a read-only cache entry.
///
/// # Errors
///
/// Returns an error if either file's metadata cannot be read or `dst`'s
/// timestamps cannot be set.
pub fn copy_mtime(src: &Path, dst: &Path) -> Result<(), Error> {
    let metadata =
        std::fs::metadata(src).map_err(|e| Error::from(StorageError::from_io_with_path(&e, src)))?;
    let mtime = metadata
        .modified()
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, src)))?;
    set_mtime(dst, mtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn set_mtime_is_observable_on_reread() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let target = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        set_mtime(file.path(), target).unwrap();

        let metadata = std::fs::metadata(file.path()).unwrap();
        let got = metadata.modified().unwrap();
        assert_eq!(
            got.duration_since(SystemTime::UNIX_EPOCH).unwrap().as_secs(),
            1_000_000
        );
    }

    #[test]
    fn copy_mtime_matches_source() {
        let src = tempfile::NamedTempFile::new().unwrap();
        let dst = tempfile::NamedTempFile::new().unwrap();
        let target = SystemTime::UNIX_EPOCH + Duration::from_secs(2_000_000);
        set_mtime(src.path(), target).unwrap();

        copy_mtime(src.path(), dst.path()).unwrap();

        let src_meta = std::fs::metadata(src.path()).unwrap();
        let dst_meta = std::fs::metadata(dst.path()).unwrap();
        assert_eq!(
            src_meta.modified().unwrap().duration_since(SystemTime::UNIX_EPOCH).unwrap(),
            dst_meta.modified().unwrap().duration_since(SystemTime::UNIX_EPOCH).unwrap(),
        );
    }
}
