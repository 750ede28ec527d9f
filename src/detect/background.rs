use image::{GrayImage, Luma};

/// Exponentially averaged reference frame.
///
/// The buffer is owned by the motion detector and is either empty
/// (uninitialized) or holds one `f32` per pixel of the last seen geometry.
#[derive(Debug, Default)]
pub struct BackgroundModel {
    width: u32,
    height: u32,
    values: Option<Vec<f32>>,
}

impl BackgroundModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.values.is_some()
    }

    /// True when the model holds a reference frame of a different size.
    pub fn geometry_differs(&self, frame: &GrayImage) -> bool {
        self.is_initialized() && (self.width != frame.width() || self.height != frame.height())
    }

    /// Seed the model from a frame.
    pub fn initialize(&mut self, frame: &GrayImage) {
        self.width = frame.width();
        self.height = frame.height();
        self.values = Some(frame.as_raw().iter().map(|&p| p as f32).collect());
    }

    pub fn reset(&mut self) {
        self.values = None;
    }

    /// `background <- (1 - weight) * background + weight * frame`.
    ///
    /// Returns false (and leaves the model untouched) when uninitialized.
    pub fn accumulate(&mut self, frame: &GrayImage, weight: f32) -> bool {
        let Some(values) = self.values.as_mut() else {
            return false;
        };
        let keep = 1.0 - weight;
        for (bg, &px) in values.iter_mut().zip(frame.as_raw()) {
            *bg = keep * *bg + weight * px as f32;
        }
        true
    }

    /// Binary mask of pixels whose difference from the background exceeds
    /// `threshold`. The background is rounded and saturated to `u8` first.
    pub fn foreground_mask(&self, frame: &GrayImage, threshold: u8) -> GrayImage {
        let mut mask = GrayImage::new(frame.width(), frame.height());
        let Some(values) = self.values.as_ref() else {
            return mask;
        };
        for ((out, &px), &bg) in mask.pixels_mut().zip(frame.as_raw()).zip(values) {
            let reference = bg.round().clamp(0.0, 255.0) as u8;
            if px.abs_diff(reference) > threshold {
                *out = Luma([255]);
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_is_an_exponential_moving_average() {
        let mut model = BackgroundModel::new();
        assert!(!model.accumulate(&GrayImage::new(2, 2), 0.5));

        model.initialize(&GrayImage::from_pixel(2, 2, Luma([0])));
        assert!(model.accumulate(&GrayImage::from_pixel(2, 2, Luma([200])), 0.5));
        assert!(model.accumulate(&GrayImage::from_pixel(2, 2, Luma([200])), 0.5));

        // 0 -> 100 -> 150; frame at 150 is within any threshold.
        let mask = model.foreground_mask(&GrayImage::from_pixel(2, 2, Luma([150])), 0);
        assert!(mask.pixels().all(|p| p.0[0] == 0));
        let mask = model.foreground_mask(&GrayImage::from_pixel(2, 2, Luma([160])), 9);
        assert!(mask.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn threshold_is_strictly_greater_than() {
        let mut model = BackgroundModel::new();
        model.initialize(&GrayImage::from_pixel(1, 1, Luma([100])));
        let mask = model.foreground_mask(&GrayImage::from_pixel(1, 1, Luma([108])), 8);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
        let mask = model.foreground_mask(&GrayImage::from_pixel(1, 1, Luma([109])), 8);
        assert_eq!(mask.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn reset_and_geometry() {
        let mut model = BackgroundModel::new();
        model.initialize(&GrayImage::new(4, 3));
        assert!(model.geometry_differs(&GrayImage::new(3, 4)));
        assert!(!model.geometry_differs(&GrayImage::new(4, 3)));
        model.reset();
        assert!(!model.is_initialized());
        assert!(!model.geometry_differs(&GrayImage::new(3, 4)));
    }
}
