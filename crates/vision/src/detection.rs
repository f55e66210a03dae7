use image::RgbImage;
use serde::Serialize;

/// Detections below this confidence are dropped before publication.
pub const CONFIDENCE_THRESHOLD: f32 = 0.8;

/// The two block orientations the model distinguishes. `Front` is the
/// pickable side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockClass {
    Back,
    Front,
}

/// Axis-aligned box in ROI-local pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// One detected block for one inference cycle. Recreated every cycle; never
/// kept as history.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class: BlockClass,
    pub confidence: f32,
}

impl Detection {
    /// Centroid in ROI-local pixel coordinates.
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        self.bbox.center()
    }
}

/// The atomically-swapped frame/detections pair. Readers always receive a
/// consistent pair, never a half-updated one.
#[derive(Debug)]
pub struct Snapshot {
    /// Annotated ROI crop from the same cycle as `detections`.
    pub frame: RgbImage,
    pub detections: Vec<Detection>,
}

/// Rectangular crop applied before inference, in full-frame pixels. The
/// origin is runtime-mutable; changes take effect on the next capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    #[must_use]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn from_array(roi: [u32; 4]) -> Self {
        Self::new(roi[0], roi[1], roi[2], roi[3])
    }

    /// Crop a full frame to this region, clamped to the frame bounds.
    #[must_use]
    pub fn crop(&self, frame: &RgbImage) -> RgbImage {
        let x = self.x.min(frame.width().saturating_sub(1));
        let y = self.y.min(frame.height().saturating_sub(1));
        let width = self.width.min(frame.width() - x).max(1);
        let height = self.height.min(frame.height() - y).max(1);
        image::imageops::crop_imm(frame, x, y, width, height).to_image()
    }
}
