use super::FailureContext;
use serde::{Deserialize, Serialize};

/// Download-specific events surfaced to the CLI and logging pipeline.
///
/// These track a single [`Download`](../../../rawpull-import) from the
/// moment a conditional request goes out to the moment its body is fully
/// written (or short-circuited by a 304).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DownloadEvent {
    /// A conditional GET was issued for this URL.
    Started {
        url: String,
        cached_etag: Option<String>,
    },

    /// The server answered 304 Not Modified; the cached image is reused as-is.
    NotModified { url: String, etag: Option<String> },

    /// Enough of the body arrived to classify the stream format.
    SniffedFormat { url: String, format: SniffedFormat },

    /// Streaming body bytes were written to the staging file.
    Progress {
        url: String,
        bytes_written: u64,
        total_bytes: Option<u64>,
    },

    /// The transfer stalled (no bytes observed within the expected window).
    Stalled { url: String, elapsed_secs: u64 },

    /// The download finished and the image was finalized into the cache.
    Completed {
        url: String,
        final_size: u64,
        etag: Option<String>,
    },

    /// The download failed at any stage.
    Failed { url: String, failure: FailureContext },
}

/// Stream formats the importer can recognize by signature sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SniffedFormat {
    /// XZ-compressed stream (magic `FD 37 7A 58 5A 00`).
    Xz,
    /// COW container image (qcow2-like) requiring conversion to raw.
    CowContainer,
    /// Uncompressed raw bytes.
    Raw,
}
