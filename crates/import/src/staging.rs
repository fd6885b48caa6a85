//! RAII cleanup for a download's staging file.
//!
//! Armed the moment the staging path is created, disarmed only once the
//! file has been renamed into its final location. Every other exit (error,
//! cancellation, panic unwind) leaves the guard armed, so `Drop` removes
//! the orphaned staging file.

use std::path::{Path, PathBuf};

pub struct StagingGuard {
    path: Option<PathBuf>,
}

impl StagingGuard {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Disarm the guard: the staging file has been renamed into place (or
    /// otherwise handed off) and must not be removed on drop.
    pub fn disarm(&mut self) {
        self.path = None;
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            // Best-effort: the path may already be gone, and this runs in a
            // context (possibly unwind-driven) where we can't propagate a
            // failure to anyone.
            let _ = std::fs::remove_file(&path);
        }
    }
}
