use std::sync::Arc;

use anyhow::{anyhow, Result};
use image::GrayImage;
use imageproc::distance_transform::Norm;

use super::background::BackgroundModel;
use super::backend::Detector;
use super::regions::{external_regions, mean_centroid};
use crate::frame::{DetectionResult, Frame};

/// Motion detector parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionConfig {
    /// Background averaging weight, in (0, 1].
    pub weight: f32,
    /// Minimum absolute intensity difference counted as motion.
    pub threshold: u8,
    /// Minimum region area (pixels²) that counts as a detection.
    pub area_threshold: f64,
    /// Gaussian smoothing sigma. `0` disables smoothing.
    pub blur_sigma: f32,
    /// Dilation radius applied to the motion mask (3x3 kernel passes).
    pub dilate_iterations: u8,
    /// Reset the background every N processed frames. `0` never resets.
    pub reset_interval: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            weight: 0.5,
            threshold: 8,
            area_threshold: 1000.0,
            blur_sigma: 3.5,
            dilate_iterations: 2,
            reset_interval: 0,
        }
    }
}

impl MotionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.weight > 0.0 && self.weight <= 1.0) {
            return Err(anyhow!(
                "motion weight must be in (0, 1], got {}",
                self.weight
            ));
        }
        if !(self.blur_sigma >= 0.0 && self.blur_sigma.is_finite()) {
            return Err(anyhow!(
                "blur sigma must be a non-negative number, got {}",
                self.blur_sigma
            ));
        }
        if !(self.area_threshold >= 0.0) {
            return Err(anyhow!(
                "area threshold must be non-negative, got {}",
                self.area_threshold
            ));
        }
        Ok(())
    }
}

/// Background-subtraction motion detector.
///
/// The first frame (and the first frame after any reset) seeds the background
/// and never reports motion. Later frames are blended into the background
/// before differencing, so a pet that stops moving fades out of the mask at a
/// rate set by `weight`.
pub struct MotionDetector {
    config: MotionConfig,
    background: BackgroundModel,
    last_detection_frame: Option<Arc<Frame>>,
    frames_since_reset: u64,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            background: BackgroundModel::new(),
            last_detection_frame: None,
            frames_since_reset: 0,
        })
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn is_tracking(&self) -> bool {
        self.background.is_initialized()
    }

    fn smoothed_gray(&self, frame: &Frame) -> GrayImage {
        let gray = image::imageops::grayscale(frame.image());
        if self.config.blur_sigma > 0.0 {
            imageproc::filter::gaussian_blur_f32(&gray, self.config.blur_sigma)
        } else {
            gray
        }
    }

    fn fallback_frame(&self, current: &Arc<Frame>) -> Arc<Frame> {
        self.last_detection_frame
            .clone()
            .unwrap_or_else(|| current.clone())
    }
}

impl Detector for MotionDetector {
    fn name(&self) -> &'static str {
        "motion"
    }

    fn process(&mut self, frame: Arc<Frame>) -> DetectionResult {
        let timestamp = frame.captured_at();
        let gray = self.smoothed_gray(&frame);

        if self.background.geometry_differs(&gray) {
            log::warn!(
                "frame geometry changed to {}x{}; reinitializing background",
                gray.width(),
                gray.height()
            );
            self.background.reset();
        }

        if !self.background.is_initialized() {
            self.background.initialize(&gray);
            self.frames_since_reset = 0;
            if self.last_detection_frame.is_none() {
                self.last_detection_frame = Some(frame.clone());
            }
            log::debug!("background initialized");
            return DetectionResult {
                centroid: None,
                frame: self.fallback_frame(&frame),
                timestamp,
            };
        }

        self.background.accumulate(&gray, self.config.weight);
        let mask = self.background.foreground_mask(&gray, self.config.threshold);
        let mask = if self.config.dilate_iterations > 0 {
            imageproc::morphology::dilate(&mask, Norm::LInf, self.config.dilate_iterations)
        } else {
            mask
        };

        let regions = external_regions(&mask, self.config.area_threshold);
        let centroid = mean_centroid(&regions);
        if centroid.is_some() {
            self.last_detection_frame = Some(frame.clone());
        }
        log::trace!("{} regions at or above area threshold", regions.len());

        self.frames_since_reset += 1;
        if self.config.reset_interval > 0 && self.frames_since_reset >= self.config.reset_interval
        {
            log::debug!(
                "resetting background after {} frames",
                self.frames_since_reset
            );
            self.background.reset();
        }

        DetectionResult {
            centroid,
            frame: self.fallback_frame(&frame),
            timestamp,
        }
    }

    fn reset(&mut self) {
        self.background.reset();
        self.frames_since_reset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Local, TimeZone};
    use image::{Rgb, RgbImage};

    const W: u32 = 160;
    const H: u32 = 120;

    fn frame_at(seq: i64, image: RgbImage) -> Arc<Frame> {
        let base = Local
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .expect("timestamp");
        Arc::new(Frame::new(
            seq.to_le_bytes().to_vec(),
            image,
            base + Duration::milliseconds(100 * seq),
        ))
    }

    fn blank() -> RgbImage {
        RgbImage::from_pixel(W, H, Rgb([20, 20, 20]))
    }

    fn with_blob(cx: u32, cy: u32, half: u32) -> RgbImage {
        let mut img = blank();
        for y in cy - half..=cy + half {
            for x in cx - half..=cx + half {
                img.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
        img
    }

    fn detector(config: MotionConfig) -> MotionDetector {
        MotionDetector::new(config).expect("valid config")
    }

    #[test]
    fn identical_frames_never_report_motion() {
        let mut md = detector(MotionConfig {
            weight: 0.3,
            ..MotionConfig::default()
        });
        let mut gradient = RgbImage::new(W, H);
        for (x, y, px) in gradient.enumerate_pixels_mut() {
            let v = ((x + 2 * y) % 256) as u8;
            *px = Rgb([v, v / 2, 255 - v]);
        }
        for seq in 0..20 {
            let result = md.process(frame_at(seq, gradient.clone()));
            assert!(!result.motion_detected(), "frame {} reported motion", seq);
        }
        assert_eq!(md.name(), "motion");
        assert_eq!(md.config().weight, 0.3);
    }

    #[test]
    fn moving_blob_is_tracked() {
        let mut md = detector(MotionConfig {
            weight: 0.05,
            threshold: 30,
            area_threshold: 100.0,
            ..MotionConfig::default()
        });
        assert!(md.process(frame_at(0, blank())).centroid.is_none());
        assert!(md.is_tracking());

        for (i, cx) in (40..=110).step_by(10).enumerate() {
            let cy = 50 + i as u32 * 3;
            let result = md.process(frame_at(i as i64 + 1, with_blob(cx, cy, 10)));
            let centroid = result.centroid.expect("blob detected");
            assert!(
                (centroid.x - cx as f64).abs() < 2.0 && (centroid.y - cy as f64).abs() < 2.0,
                "centroid {:?} too far from ({}, {})",
                centroid,
                cx,
                cy
            );
        }
    }

    #[test]
    fn small_regions_are_ignored() {
        let mut md = detector(MotionConfig {
            weight: 0.05,
            threshold: 30,
            area_threshold: 5000.0,
            ..MotionConfig::default()
        });
        md.process(frame_at(0, blank()));
        let result = md.process(frame_at(1, with_blob(80, 60, 8)));
        assert!(result.centroid.is_none());
    }

    #[test]
    fn result_carries_last_frame_with_detection() {
        let mut md = detector(MotionConfig {
            weight: 0.05,
            threshold: 30,
            area_threshold: 100.0,
            ..MotionConfig::default()
        });
        let first = frame_at(0, blank());
        let r0 = md.process(first.clone());
        assert!(Arc::ptr_eq(&r0.frame, &first));

        // Background differs from nothing yet: still the first frame.
        let quiet = frame_at(1, blank());
        let r1 = md.process(quiet);
        assert!(r1.centroid.is_none());
        assert!(Arc::ptr_eq(&r1.frame, &first));

        let moving = frame_at(2, with_blob(80, 60, 10));
        let r2 = md.process(moving.clone());
        assert!(r2.centroid.is_some());
        assert!(Arc::ptr_eq(&r2.frame, &moving));
        assert_eq!(r2.timestamp, moving.captured_at());

        // Blob vanishes. The ghost left in the background is tiny at this
        // weight, so nothing qualifies and the retained frame is returned.
        let after = frame_at(3, blank());
        let r3 = md.process(after.clone());
        assert!(r3.centroid.is_none());
        assert!(Arc::ptr_eq(&r3.frame, &moving));
        assert_eq!(r3.timestamp, after.captured_at());
    }

    #[test]
    fn reset_interval_reinitializes_background() {
        let mut md = detector(MotionConfig {
            weight: 0.05,
            threshold: 30,
            area_threshold: 100.0,
            reset_interval: 3,
            ..MotionConfig::default()
        });
        md.process(frame_at(0, blank()));
        for seq in 1..=3 {
            md.process(frame_at(seq, blank()));
        }
        // Third processed frame triggered the reset.
        assert!(!md.is_tracking());

        // The frame after a reset only seeds the background, even with a blob.
        let r = md.process(frame_at(4, with_blob(80, 60, 10)));
        assert!(r.centroid.is_none());
        assert!(md.is_tracking());
    }

    #[test]
    fn zero_reset_interval_never_resets() {
        let mut md = detector(MotionConfig::default());
        for seq in 0..200 {
            md.process(frame_at(seq, blank()));
        }
        assert!(md.is_tracking());
    }

    #[test]
    fn explicit_reset_and_geometry_change() {
        let mut md = detector(MotionConfig {
            weight: 0.05,
            threshold: 30,
            area_threshold: 100.0,
            ..MotionConfig::default()
        });
        md.process(frame_at(0, blank()));
        md.reset();
        assert!(!md.is_tracking());
        assert!(md.process(frame_at(1, with_blob(80, 60, 10))).centroid.is_none());

        let smaller = RgbImage::from_pixel(80, 60, Rgb([250, 250, 250]));
        assert!(md.process(frame_at(2, smaller)).centroid.is_none());
        assert!(md.is_tracking());
    }

    #[test]
    fn rejects_out_of_range_weight() {
        for weight in [0.0, -0.1, 1.5, f32::NAN] {
            let config = MotionConfig {
                weight,
                ..MotionConfig::default()
            };
            assert!(MotionDetector::new(config).is_err());
        }
        let config = MotionConfig {
            weight: 1.0,
            ..MotionConfig::default()
        };
        assert!(MotionDetector::new(config).is_ok());
    }
}
