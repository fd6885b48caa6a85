//! Sparse-aware writer for staged raw image bytes.
//!
//! Decompressed image bytes routinely contain long runs of zeros (unused
//! blocks in the source filesystem). Writing those runs out verbatim wastes
//! real disk space on any filesystem that supports holes. `SparseWriter`
//! buffers incoming bytes to `alignment`-sized blocks; an all-zero block is
//! skipped via a seek instead of a write, leaving a hole for the filesystem
//! to materialize lazily. [`SparseWriter::finish`] reconciles the final
//! logical length with `set_len` so a trailing hole still produces a
//! correctly sized file.

use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

pub struct SparseWriter {
    file: File,
    alignment: usize,
    buffer: Vec<u8>,
    written: u64,
}

impl SparseWriter {
    /// Wrap a freshly created, empty file for sparse writing.
    #[must_use]
    pub fn new(file: File, alignment: u64) -> Self {
        let alignment = usize::try_from(alignment).unwrap_or(4096).max(1);
        Self {
            file,
            alignment,
            buffer: Vec::with_capacity(alignment),
            written: 0,
        }
    }

    /// Logical bytes accepted so far (including holes).
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Feed the next chunk of decompressed bytes through the writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying file cannot be seeked or written.
    pub async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.buffer.extend_from_slice(data);
        while self.buffer.len() >= self.alignment {
            let block: Vec<u8> = self.buffer.drain(..self.alignment).collect();
            self.emit_block(&block).await?;
        }
        Ok(())
    }

    /// Flush any buffered remainder and truncate the file to the exact
    /// logical length, materializing a trailing hole if the stream ended on
    /// one.
    ///
    /// # Errors
    ///
    /// Returns an error if the final write, truncate, or flush fails.
    pub async fn finish(mut self) -> std::io::Result<File> {
        if !self.buffer.is_empty() {
            let block = std::mem::take(&mut self.buffer);
            self.emit_block(&block).await?;
        }
        self.file.set_len(self.written).await?;
        self.file.flush().await?;
        Ok(self.file)
    }

    async fn emit_block(&mut self, block: &[u8]) -> std::io::Result<()> {
        if block.iter().all(|&b| b == 0) {
            self.file.seek(SeekFrom::Current(block.len() as i64)).await?;
        } else {
            self.file.write_all(block).await?;
        }
        self.written += block.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn read_back(mut file: File) -> Vec<u8> {
        file.seek(SeekFrom::Start(0)).await.unwrap();
        let mut out = Vec::new();
        file.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn all_zero_input_produces_correctly_sized_hole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.raw");
        let file = File::create(&path).await.unwrap();

        let mut writer = SparseWriter::new(file, 16);
        writer.write_all(&[0u8; 64]).await.unwrap();
        let file = writer.finish().await.unwrap();

        let contents = read_back(file).await;
        assert_eq!(contents.len(), 64);
        assert!(contents.iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn mixed_content_round_trips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.raw");
        let file = File::create(&path).await.unwrap();

        let mut data = vec![0u8; 16];
        data.extend_from_slice(&[1, 2, 3, 4]);
        data.extend_from_slice(&[0u8; 16]);

        let mut writer = SparseWriter::new(file, 16);
        writer.write_all(&data).await.unwrap();
        let file = writer.finish().await.unwrap();

        let contents = read_back(file).await;
        assert_eq!(contents, data);
    }

    #[tokio::test]
    async fn unaligned_trailing_remainder_is_flushed_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.raw");
        let file = File::create(&path).await.unwrap();

        let mut writer = SparseWriter::new(file, 16);
        writer.write_all(&[9u8; 5]).await.unwrap();
        assert_eq!(writer.bytes_written(), 0);
        let file = writer.finish().await.unwrap();

        let contents = read_back(file).await;
        assert_eq!(contents, vec![9u8; 5]);
    }
}
