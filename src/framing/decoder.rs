//! Marker-scanning decode loop.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use super::Markers;

/// Default size of each read from the shell's output stream.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Extracts framed command output from a continuous byte stream.
///
/// The decoder owns a carry-over buffer that survives across frames:
/// bytes read past one frame's end marker stay buffered and are scanned
/// (and discarded) by the next frame's start search. Markers that
/// straddle two reads are found because matching always runs over the
/// accumulated buffer rather than a single chunk.
pub struct FrameDecoder<R> {
    reader: R,
    buffer: Vec<u8>,
    chunk: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameDecoder<R> {
    /// Create a decoder reading [`DEFAULT_CHUNK_SIZE`] bytes at a time.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            chunk: vec![0u8; DEFAULT_CHUNK_SIZE],
        }
    }

    /// Create with custom chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk = vec![0u8; size.max(1)];
        self
    }

    /// Bytes read from the stream but not yet consumed by a frame.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Read until the frame delimited by `markers` is complete.
    ///
    /// Returns the raw bytes between the start marker line and the end
    /// marker. Fails with `UnexpectedEof` if the stream closes first.
    pub async fn read_frame(&mut self, markers: &Markers) -> io::Result<Vec<u8>> {
        self.skip_to_start(&markers.start_line()).await?;
        self.take_until_end(markers.end().as_bytes()).await
    }

    async fn skip_to_start(&mut self, start: &[u8]) -> io::Result<()> {
        loop {
            if let Some(pos) = find(&self.buffer, start) {
                self.buffer.drain(..pos + start.len());
                return Ok(());
            }

            // Keep just enough tail to complete a marker split across reads.
            let keep = start.len() - 1;
            if self.buffer.len() > keep {
                let cut = self.buffer.len() - keep;
                self.buffer.drain(..cut);
            }

            self.fill().await?;
        }
    }

    async fn take_until_end(&mut self, end: &[u8]) -> io::Result<Vec<u8>> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = find(&self.buffer[scanned..], end) {
                let at = scanned + pos;
                let body = self.buffer[..at].to_vec();

                let mut consumed = at + end.len();
                if self.buffer.get(consumed) == Some(&b'\n') {
                    consumed += 1;
                }
                self.buffer.drain(..consumed);
                return Ok(body);
            }

            scanned = self.buffer.len().saturating_sub(end.len() - 1);
            self.fill().await?;
        }
    }

    async fn fill(&mut self) -> io::Result<()> {
        let n = self.reader.read(&mut self.chunk).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "shell output stream closed",
            ));
        }
        trace!(bytes = n, "read output chunk");
        self.buffer.extend_from_slice(&self.chunk[..n]);
        Ok(())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
