//! Frame ingestion sources.
//!
//! This module provides the sources frames are pulled from:
//! - HTTP MJPEG camera streams (`MjpegHttpSource`)
//! - Local MJPEG recordings (`MjpegFileSource`)
//!
//! Every source yields frames strictly in capture order. A frame that cannot
//! be decoded is reported as a non-fatal `IngestError::Decode` and the source
//! stays usable; any other error ends the stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::frame::Frame;

pub mod file;
pub mod http;
pub mod mjpeg;

pub use file::{FileConfig, MjpegFileSource};
pub use http::{CameraConfig, MjpegHttpSource};
pub use mjpeg::{find_jpeg_bounds, MjpegStream};

/// Acquisition failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// No complete frame could be located within the attempt budget.
    Boundary { attempts: u32 },
    /// One frame was located but could not be decoded.
    Decode(String),
    /// Connection, read or end-of-stream failure.
    Stream(String),
}

impl IngestError {
    /// Fatal errors end the pipeline; the rest drop a single frame.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, IngestError::Decode(_))
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Boundary { attempts } => write!(
                f,
                "could not locate a frame boundary after {} attempts",
                attempts
            ),
            IngestError::Decode(reason) => write!(f, "frame decode failed: {}", reason),
            IngestError::Stream(reason) => write!(f, "frame stream failed: {}", reason),
        }
    }
}

impl std::error::Error for IngestError {}

pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// A blocking, ordered, non-restartable frame sequence.
pub trait FrameSource: Send {
    /// Human-readable origin for logs.
    fn describe(&self) -> String;

    /// Block until the next frame is available.
    fn next_frame(&mut self) -> IngestResult<Frame>;

    /// Frames successfully produced so far.
    fn frames_captured(&self) -> u64;
}

/// Decode a located JPEG into a frame stamped with the current local time.
pub(crate) fn decode_frame(jpeg: Vec<u8>) -> IngestResult<Frame> {
    Frame::decode(jpeg, chrono::Local::now()).map_err(|e| IngestError::Decode(format!("{:#}", e)))
}

/// Run `source` on its own thread, handing frames over a bounded channel.
///
/// The channel preserves order and blocks the reader when `capacity` frames
/// are waiting. The thread stops after a fatal error (which is forwarded),
/// when `stop` is set, or when the receiver is dropped.
pub fn spawn_reader<S>(
    mut source: S,
    capacity: usize,
    stop: Arc<AtomicBool>,
) -> (Receiver<IngestResult<Frame>>, JoinHandle<()>)
where
    S: FrameSource + 'static,
{
    let (tx, rx) = sync_channel(capacity.max(1));
    let handle = std::thread::spawn(move || {
        while !stop.load(Ordering::SeqCst) {
            let item = source.next_frame();
            let fatal = item.as_ref().err().is_some_and(IngestError::is_fatal);
            if tx.send(item).is_err() || fatal {
                break;
            }
        }
        log::debug!(
            "reader for {} exiting after {} frames",
            source.describe(),
            source.frames_captured()
        );
    });
    (rx, handle)
}
