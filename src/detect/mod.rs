mod backend;
mod background;
mod motion;
mod regions;

pub use backend::Detector;
pub use background::BackgroundModel;
pub use motion::{MotionConfig, MotionDetector};
pub use regions::{external_regions, mean_centroid, Region};
