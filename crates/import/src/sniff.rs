//! Streaming format classification.
//!
//! A download can't know whether its body is XZ-compressed until enough
//! bytes have arrived to compare against the magic signature. Until that
//! decision is made the download buffers everything it receives; once made,
//! the buffered prefix is drained through the same write path as everything
//! that follows.

use rawpull_config::fixed::XZ_MAGIC;

/// Decide whether `payload` is an XZ stream, or `None` if not enough bytes
/// have arrived yet to tell (and the stream hasn't ended).
///
/// `stream_ended` must be `true` once the body is known to have no more
/// bytes coming; a body shorter than the magic's length is then classified
/// as definitively not XZ rather than left undecided forever.
#[must_use]
pub fn classify(payload: &[u8], stream_ended: bool) -> Option<bool> {
    if payload.len() >= XZ_MAGIC.len() {
        Some(payload[..XZ_MAGIC.len()] == XZ_MAGIC)
    } else if stream_ended {
        Some(false)
    } else {
        None
    }
}
