//! Streaming XZ decompression.
//!
//! Wraps `xz2`'s push/pull liblzma bindings behind the shape the download
//! state machine's write path wants: feed it one chunk of compressed input,
//! get back zero or more ≤16 KiB plaintext chunks, know when the stream has
//! ended.

use rawpull_errors::{Error, NetworkError};
use xz2::stream::{Action, Status, Stream};

const OUTPUT_CHUNK: usize = 16 * 1024;

/// Incremental XZ decoder. One instance per download, created once the
/// stream has been classified as XZ-compressed.
pub struct Decoder {
    stream: Stream,
    ended: bool,
}

impl Decoder {
    /// Build a decoder with no memory limit, tolerating integrity-check
    /// algorithms liblzma doesn't itself implement (a server may use one we
    /// don't need to verify).
    ///
    /// # Errors
    ///
    /// Returns an error if liblzma fails to allocate the decoder state.
    pub fn new() -> Result<Self, Error> {
        let stream = Stream::new_stream_decoder(u64::MAX, xz2::stream::TELL_UNSUPPORTED_CHECK)
            .map_err(|e| NetworkError::DownloadFailed(format!("xz decoder init failed: {e}")))?;
        Ok(Self {
            stream,
            ended: false,
        })
    }

    /// Feed `input` through the decoder, invoking `on_output` with each
    /// decoded chunk (up to 16 KiB at a time) as it becomes available.
    ///
    /// Returns `true` once the stream has reported its logical end; further
    /// calls after that point are a no-op cooperating with callers that keep
    /// draining trailing chunks defensively.
    ///
    /// # Errors
    ///
    /// Returns an error if liblzma reports anything other than `Ok` or
    /// `StreamEnd`.
    pub fn feed(
        &mut self,
        mut input: &[u8],
        mut on_output: impl FnMut(&[u8]) -> Result<(), Error>,
    ) -> Result<bool, Error> {
        if self.ended {
            return Ok(true);
        }

        loop {
            let mut out_buf = [0u8; OUTPUT_CHUNK];
            let before_in = self.stream.total_in();
            let before_out = self.stream.total_out();

            let status = self
                .stream
                .process(input, &mut out_buf, Action::Run)
                .map_err(|e| NetworkError::DownloadFailed(format!("xz decode failed: {e}")))?;

            let produced = usize::try_from(self.stream.total_out() - before_out).unwrap_or(0);
            if produced > 0 {
                on_output(&out_buf[..produced])?;
            }

            let consumed = usize::try_from(self.stream.total_in() - before_in).unwrap_or(0);
            input = &input[consumed..];

            match status {
                Status::StreamEnd => {
                    self.ended = true;
                    return Ok(true);
                }
                Status::Ok => {
                    if input.is_empty() {
                        return Ok(false);
                    }
                    if consumed == 0 && produced == 0 {
                        return Err(NetworkError::DownloadFailed(
                            "xz decoder made no progress on non-empty input".to_string(),
                        )
                        .into());
                    }
                }
                other => {
                    return Err(NetworkError::DownloadFailed(format!(
                        "unexpected xz decoder status: {other:?}"
                    ))
                    .into())
                }
            }
        }
    }
}
