use std::sync::Arc;

use crate::frame::{DetectionResult, Frame};

/// Detector trait.
///
/// A detector consumes frames strictly in capture order and may keep state
/// between calls (a background model, the last frame with motion). It must
/// produce exactly one result per input frame.
pub trait Detector: Send {
    /// Detector identifier, used in logs.
    fn name(&self) -> &'static str;

    /// Process the next frame.
    fn process(&mut self, frame: Arc<Frame>) -> DetectionResult;

    /// Drop any accumulated reference state. The next frame re-initializes it.
    fn reset(&mut self);
}
