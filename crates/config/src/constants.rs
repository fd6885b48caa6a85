//! Centralized, non-configurable constants for the raw disk-image importer
//!
//! The size cap in particular is a hard invariant of the import pipeline,
//! not a tunable: it exists to bound disk usage regardless of what a
//! misbehaving or malicious server declares. [`Config::raw_max_size`]
//! allows lowering it, never raising it past this ceiling.

/// Hard upper bound on a single imported raw image, in bytes (8 GiB).
pub const RAW_MAX_SIZE: u64 = 8 * 1024 * 1024 * 1024;

/// Default root directory under which cached images and staging files live.
pub const DEFAULT_IMAGE_ROOT: &str = "/var/lib/rawpull/images";

/// Byte signature that identifies an XZ stream (`FD 37 7A 58 5A 00`).
pub const XZ_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];

/// Mask applied to a finalized cache entry's existing mode bits, producing a
/// read-only result: ANDed against the mode the staging file already has, it
/// can only ever clear bits, never set them, so the finalized entry's mode is
/// always a subset of `0o444`.
pub const CACHE_FILE_MODE: u32 = 0o7444;

/// Extended attribute recording the origin URL on a finalized cache entry.
pub const XATTR_SOURCE_URL: &str = "user.source_url";

/// Extended attribute recording the origin ETag on a finalized cache entry.
pub const XATTR_SOURCE_ETAG: &str = "user.source_etag";
