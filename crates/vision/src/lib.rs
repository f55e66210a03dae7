mod annotate;
mod calibration;
mod camera;
mod detection;
mod detector;
mod service;

pub use calibration::{AffineTransform, CalibrationError, CalibrationPoint, PointResidual};
pub use camera::{CaptureError, FrameSource, StaticFrameSource};
pub use detection::{BlockClass, BoundingBox, CONFIDENCE_THRESHOLD, Detection, Roi, Snapshot};
pub use detector::{DetectError, Detector};
pub use service::VisionService;
