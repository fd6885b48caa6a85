use super::FailureContext;
use serde::{Deserialize, Serialize};

/// Lifecycle events for an import session and the downloads it coordinates.
///
/// Distinct from [`super::DownloadEvent`]: these mark session- and
/// download-level transitions (begin/cancel/finalize) rather than the byte
/// plumbing of a single transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ImportEvent {
    /// A new import session was created, rooted at `image_root`.
    SessionStarted { session_id: String, image_root: String },

    /// The session's event loop observed its terminal completion event.
    SessionCompleted {
        session_id: String,
        downloads_completed: usize,
        downloads_failed: usize,
    },

    /// The session failed to initialize (e.g. the event loop couldn't start).
    SessionFailed {
        session_id: String,
        failure: FailureContext,
    },

    /// A `pull` request was accepted and a new download entered `Fresh`.
    DownloadBegun { session_id: String, url: String },

    /// A `pull` request was rejected because that URL already has a
    /// download in progress.
    DownloadRejected { session_id: String, url: String, reason: String },

    /// A download was cancelled before reaching a terminal state.
    DownloadCancelled { session_id: String, url: String },

    /// A download reached `Done`: the cache file was renamed into place,
    /// chmod'd read-only, and tagged with provenance xattrs.
    DownloadFinalized {
        session_id: String,
        url: String,
        cache_path: String,
    },

    /// A writable local copy was materialized alongside the read-only cache
    /// entry, per the caller's `local` path request.
    LocalCopyMaterialized {
        session_id: String,
        url: String,
        local_path: String,
    },

    /// A download failed at any stage and its staging file was removed.
    DownloadFailed {
        session_id: String,
        url: String,
        failure: FailureContext,
    },
}
