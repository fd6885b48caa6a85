//! Random staging filenames.
//!
//! A download is written to a staging path alongside the final cache entry
//! and atomically renamed into place once finalized, so two concurrent
//! downloads of different URLs never race on the same staging file even if
//! they happen to share a directory.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::{Path, PathBuf};

const SUFFIX_LEN: usize = 12;

/// Generate a staging path of the form `<dir>/.rawpull-tmp-<random>`.
#[must_use]
pub fn staging_path(dir: &Path) -> PathBuf {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    dir.join(format!(".rawpull-tmp-{suffix}"))
}
