//! Frame and detection result types.
//!
//! - `Frame`: one captured camera image. Carries the encoded JPEG as received,
//!   the decoded RGB buffer, and the local capture time.
//! - `DetectionResult`: what the motion detector reports for one input frame.
//!
//! Frames are handed around as `Arc<Frame>` so the detector can keep the last
//! frame that had a detection without copying pixel data.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::RgbImage;

/// A single captured frame.
pub struct Frame {
    raw: Vec<u8>,
    image: RgbImage,
    captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(raw: Vec<u8>, image: RgbImage, captured_at: DateTime<Local>) -> Self {
        Self {
            raw,
            image,
            captured_at,
        }
    }

    /// Decode an encoded JPEG (or any format the `image` crate was built with).
    pub fn decode(raw: Vec<u8>, captured_at: DateTime<Local>) -> Result<Self> {
        let image = image::load_from_memory(&raw)
            .context("decode frame")?
            .into_rgb8();
        Ok(Self::new(raw, image, captured_at))
    }

    /// Encoded bytes exactly as received from the source.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("raw_len", &self.raw.len())
            .field("width", &self.width())
            .field("height", &self.height())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// Image-space coordinate of a detection, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Result of running motion detection on one frame.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    /// Averaged centroid of all qualifying motion regions, if any.
    pub centroid: Option<Point>,
    /// The current frame when `centroid` is set; otherwise the last frame
    /// that had a detection (or the first frame seen).
    pub frame: Arc<Frame>,
    /// Capture time of the frame that was processed.
    pub timestamp: DateTime<Local>,
}

impl DetectionResult {
    pub fn motion_detected(&self) -> bool {
        self.centroid.is_some()
    }
}
