//! Extended-attribute provenance tagging for finalized cache entries.
//!
//! Every `.raw` file gets `user.source_url` and `user.source_etag` set once,
//! right before the file is chmod'd read-only. This lets an operator recover
//! which URL and ETag produced a given cache entry without parsing the
//! filename's escaped encoding.

use rawpull_errors::{Error, StorageError};
use std::path::Path;

const XATTR_SOURCE_URL: &str = "user.source_url";
const XATTR_SOURCE_ETAG: &str = "user.source_etag";

/// Tag a file with its origin URL and, if present, the ETag that produced it.
///
/// # Errors
///
/// Returns an error if the underlying filesystem does not support extended
/// attributes or the write otherwise fails.
pub fn tag_source(path: &Path, url: &str, etag: Option<&str>) -> Result<(), Error> {
    set(path, XATTR_SOURCE_URL, url.as_bytes())?;
    if let Some(etag) = etag {
        set(path, XATTR_SOURCE_ETAG, etag.as_bytes())?;
    }
    Ok(())
}

/// Read back the source URL tagged on a cache entry, if any.
#[must_use]
pub fn read_source_url(path: &Path) -> Option<String> {
    get(path, XATTR_SOURCE_URL)
}

/// Read back the source ETag tagged on a cache entry, if any.
#[must_use]
pub fn read_source_etag(path: &Path) -> Option<String> {
    get(path, XATTR_SOURCE_ETAG)
}

fn set(path: &Path, name: &str, value: &[u8]) -> Result<(), Error> {
    xattr::set(path, name, value)
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, path)))
}

fn get(path: &Path, name: &str) -> Option<String> {
    xattr::get(path, name)
        .ok()
        .flatten()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
