//! Core configuration types shared by the importer and its CLI entry point

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem layout for an import session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Root directory that owns the cache entries and staging files for a
    /// session. Created on session startup if missing.
    #[serde(default = "default_image_root")]
    pub image_root: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            image_root: default_image_root(),
        }
    }
}

fn default_image_root() -> PathBuf {
    PathBuf::from(crate::constants::DEFAULT_IMAGE_ROOT)
}

/// HTTP transport tuning, passed through to `rawpull-net`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            retries: default_retries(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

/// Import policy: size caps and streaming tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Per-image size cap. Must not exceed [`crate::constants::RAW_MAX_SIZE`];
    /// values above that ceiling are clamped down to it at load time.
    #[serde(default = "default_raw_max_size")]
    pub raw_max_size: u64,

    /// Alignment, in bytes, used to detect long runs of zero bytes that can
    /// be punched as sparse holes instead of written out. Must be a power of
    /// two no smaller than the filesystem's own block size assumption.
    #[serde(default = "default_sparse_alignment")]
    pub sparse_alignment: u64,

    /// Size of the in-memory buffer used to stage decompressed bytes before
    /// a sparse-write decision is made for that window.
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            raw_max_size: default_raw_max_size(),
            sparse_alignment: default_sparse_alignment(),
            write_buffer_size: default_write_buffer_size(),
        }
    }
}

fn default_timeout() -> u64 {
    300
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1
}

fn default_raw_max_size() -> u64 {
    crate::constants::RAW_MAX_SIZE
}

fn default_sparse_alignment() -> u64 {
    4096
}

fn default_write_buffer_size() -> usize {
    1024 * 1024
}
