//! JPEG frame extraction from an MJPEG byte stream.
//!
//! Frames are located by their JPEG markers: start-of-image `FF D8` and the
//! first end-of-image `FF D9` after it. Multipart headers and other bytes
//! between frames are skipped. Each chunk is filled completely (short reads
//! from sockets are retried) before it counts as one attempt; a chunk that
//! does not complete a frame is a failed attempt, and the counter resets
//! whenever a frame is found.

use std::io::{ErrorKind, Read};

use super::IngestError;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Cap on buffered bytes while searching for a frame.
pub const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_CHUNK_BYTES: usize = 16 * 1024;
pub const DEFAULT_MAX_BOUNDARY_ATTEMPTS: u32 = 10;

pub struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
    chunk_bytes: usize,
    max_attempts: u32,
    failed_attempts: u32,
}

impl MjpegStream {
    pub fn new(reader: Box<dyn Read + Send>, chunk_bytes: usize, max_attempts: u32) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
            chunk_bytes: chunk_bytes.max(1),
            max_attempts,
            failed_attempts: 0,
        }
    }

    /// Consecutive chunk reads that have not produced a frame.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Read until one complete JPEG is buffered and return its bytes.
    pub fn read_next_jpeg(&mut self) -> Result<Vec<u8>, IngestError> {
        let mut chunk = vec![0u8; self.chunk_bytes];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                self.failed_attempts = 0;
                return Ok(frame);
            }

            if self.failed_attempts > self.max_attempts {
                return Err(IngestError::Boundary {
                    attempts: self.failed_attempts,
                });
            }

            let read = fill_chunk(&mut self.reader, &mut chunk)
                .map_err(|e| IngestError::Stream(format!("read mjpeg chunk: {}", e)))?;
            if read == 0 {
                return Err(IngestError::Stream("mjpeg stream ended".to_string()));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if find_jpeg_bounds(&self.buffer).is_none() {
                self.failed_attempts += 1;
                log::trace!(
                    "no complete frame after chunk ({} buffered, attempt {})",
                    self.buffer.len(),
                    self.failed_attempts
                );
            }

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let keep = 2.min(self.buffer.len());
                let drain_len = self.buffer.len() - keep;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

/// Read until `chunk` is full or the reader reaches end of stream.
fn fill_chunk(reader: &mut dyn Read, chunk: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < chunk.len() {
        match reader.read(&mut chunk[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn find_marker(buffer: &[u8], marker: [u8; 2], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .windows(2)
        .position(|w| w == marker)
        .map(|i| i + from)
}

/// Byte range `[start, end)` of the first complete JPEG in `buffer`.
pub fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = find_marker(buffer, SOI, 0)?;
    let eoi = find_marker(buffer, EOI, start + 2)?;
    Some((start, eoi + 2))
}
