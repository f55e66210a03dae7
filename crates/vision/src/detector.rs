use crate::detection::Detection;
use image::RgbImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Boundary to the detection model. Receives the ROI crop, returns raw
/// detections in ROI-local coordinates; confidence filtering happens in the
/// service, not here.
pub trait Detector: Send {
    /// Run one inference pass over a cropped frame.
    ///
    /// # Errors
    ///
    /// An inference failure skips the current cycle; the capture loop
    /// continues with the next frame.
    fn infer(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, DetectError>;
}
