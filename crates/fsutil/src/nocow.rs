//! Disabling copy-on-write on newly created cache files.
//!
//! On copy-on-write filesystems (btrfs, and bcachefs to a lesser extent) a
//! large sequential write benefits from the `FS_NOCOW_FL` inode flag: it
//! keeps the importer's sparse writes from fragmenting into a CoW chain on
//! every partial overwrite. Filesystems that don't understand the flag
//! (ext4, xfs, tmpfs) simply reject the ioctl, which we treat as a no-op
//! rather than a hard failure.

use nix::{ioctl_read, ioctl_write_ptr};
use rawpull_errors::{Error, StorageError};
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::Path;

const FS_NOCOW_FL: i64 = 0x0080_0000;

ioctl_read!(fs_ioc_getflags, b'f', 1, i64);
ioctl_write_ptr!(fs_ioc_setflags, b'f', 2, i64);

/// Set the `FS_NOCOW_FL` attribute on a freshly created file.
///
/// Best-effort: filesystems without CoW semantics return `ENOTTY` for this
/// ioctl, which is swallowed rather than surfaced as an import failure.
///
/// # Errors
///
/// Returns an error only if the file itself cannot be opened.
pub fn disable_cow(path: &Path) -> Result<(), Error> {
    let file = File::open(path).map_err(|e| Error::from(StorageError::from_io_with_path(&e, path)))?;
    let fd = file.as_raw_fd();

    let mut flags: i64 = 0;
    // SAFETY: `fd` is a valid, open file descriptor for the lifetime of this
    // call and `flags` is large enough to hold the kernel's response.
    let got = unsafe { fs_ioc_getflags(fd, &mut flags) };
    if got.is_err() {
        return Ok(());
    }

    flags |= FS_NOCOW_FL;
    // SAFETY: same fd, flags now holds a value the kernel previously handed
    // back plus the one bit we're adding.
    let _ = unsafe { fs_ioc_setflags(fd, &flags) };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_cow_on_missing_file_errors() {
        let result = disable_cow(Path::new("/nonexistent/rawpull-nocow-test"));
        assert!(result.is_err());
    }

    #[test]
    fn disable_cow_on_regular_file_does_not_panic() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // Whatever filesystem the test runs on, this must not fail hard.
        disable_cow(file.path()).unwrap();
    }
}
