use image::RgbImage;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Frame acquisition timed out")]
    Timeout,

    /// The device closed the grab session; the capture loop must exit.
    #[error("Frame acquisition aborted")]
    Aborted,

    #[error("Camera device error: {0}")]
    Device(String),
}

/// Boundary to the camera SDK. One blocking call per frame, bounded by the
/// given timeout.
pub trait FrameSource: Send {
    /// Acquire the next full frame.
    ///
    /// # Errors
    ///
    /// [`CaptureError::Aborted`] terminates the capture loop; every other
    /// variant is logged and the loop moves on to the next frame.
    fn acquire(&mut self, timeout: Duration) -> Result<RgbImage, CaptureError>;
}

/// File-backed source that serves the same frame forever. Stands in for the
/// camera during bring-up and in tests.
pub struct StaticFrameSource {
    frame: RgbImage,
}

impl StaticFrameSource {
    #[must_use]
    pub fn new(frame: RgbImage) -> Self {
        Self { frame }
    }

    /// Load the frame from an image file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or decoded.
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let frame = image::open(path)
            .map_err(|e| CaptureError::Device(e.to_string()))?
            .to_rgb8();
        Ok(Self { frame })
    }
}

impl FrameSource for StaticFrameSource {
    fn acquire(&mut self, _timeout: Duration) -> Result<RgbImage, CaptureError> {
        Ok(self.frame.clone())
    }
}
