//! Local MJPEG recording source.
//!
//! Replays a file of concatenated JPEGs (a raw `.mjpeg` dump or a saved
//! multipart body) through the same extraction path as the camera source.
//! Frames are stamped with the time they are read, optionally paced to a
//! target rate so dwell thresholds behave as they would live.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::mjpeg::{MjpegStream, DEFAULT_CHUNK_BYTES, DEFAULT_MAX_BOUNDARY_ATTEMPTS};
use super::{decode_frame, FrameSource, IngestError, IngestResult};
use crate::frame::Frame;

/// Configuration for a local recording.
#[derive(Clone, Debug, PartialEq)]
pub struct FileConfig {
    pub path: PathBuf,
    /// Replay rate. `0` replays as fast as frames can be read.
    pub target_fps: u32,
    pub max_boundary_attempts: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            target_fps: 0,
            max_boundary_attempts: DEFAULT_MAX_BOUNDARY_ATTEMPTS,
        }
    }
}

pub struct MjpegFileSource {
    config: FileConfig,
    stream: MjpegStream,
    last_frame_at: Option<Instant>,
    frame_count: u64,
}

impl MjpegFileSource {
    pub fn open(config: FileConfig) -> IngestResult<Self> {
        let file = File::open(&config.path).map_err(|e| {
            IngestError::Stream(format!("open recording {}: {}", config.path.display(), e))
        })?;
        let stream = MjpegStream::new(
            Box::new(BufReader::new(file)),
            DEFAULT_CHUNK_BYTES,
            config.max_boundary_attempts,
        );
        Ok(Self {
            config,
            stream,
            last_frame_at: None,
            frame_count: 0,
        })
    }

    fn pace(&mut self) {
        if self.config.target_fps == 0 {
            return;
        }
        let interval = Duration::from_millis((1000 / self.config.target_fps).max(1) as u64);
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

impl FrameSource for MjpegFileSource {
    fn describe(&self) -> String {
        self.config.path.display().to_string()
    }

    fn next_frame(&mut self) -> IngestResult<Frame> {
        let jpeg = self.stream.read_next_jpeg()?;
        self.pace();
        let frame = decode_frame(jpeg)?;
        self.frame_count += 1;
        Ok(frame)
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}
