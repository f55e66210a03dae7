use crate::annotate::annotate;
use crate::camera::{CaptureError, FrameSource};
use crate::detection::{BlockClass, CONFIDENCE_THRESHOLD, Detection, Roi, Snapshot};
use crate::detector::Detector;
use image::codecs::jpeg::JpegEncoder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{info, warn};

const JPEG_QUALITY: u8 = 90;

/// The two fields shared between the capture thread and readers. Guarded by
/// one mutex; the lock is only ever held for field access, never across a
/// capture, inference or encode call.
struct Shared {
    roi: Roi,
    snapshot: Option<Arc<Snapshot>>,
}

enum LoopStep {
    Continue,
    Stop,
}

/// Owns the camera and detector and publishes a continuously updated
/// `{frame, detections}` snapshot from a dedicated capture thread.
///
/// Readers never block on the capture loop: every accessor clones the latest
/// `Arc<Snapshot>` under a brief critical section.
pub struct VisionService {
    shared: Arc<Mutex<Shared>>,
    running: Arc<AtomicBool>,
    capture_timeout: Duration,
    pipeline: Option<(Box<dyn FrameSource>, Box<dyn Detector>)>,
    handle: Option<JoinHandle<()>>,
}

impl VisionService {
    #[must_use]
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        roi: Roi,
        capture_timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared { roi, snapshot: None })),
            running: Arc::new(AtomicBool::new(false)),
            capture_timeout,
            pipeline: Some((source, detector)),
            handle: None,
        }
    }

    /// Spawn the capture thread. A second call is a no-op.
    pub fn start(&mut self) {
        let Some((mut source, mut detector)) = self.pipeline.take() else {
            warn!("Vision service already started");
            return;
        };
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let shared = Arc::clone(&self.shared);
        let capture_timeout = self.capture_timeout;
        self.handle = Some(std::thread::spawn(move || {
            info!("Vision capture loop started");
            while running.load(Ordering::SeqCst) {
                let step = iterate(&shared, source.as_mut(), detector.as_mut(), capture_timeout);
                if matches!(step, LoopStep::Stop) {
                    break;
                }
            }
            info!("Vision capture loop stopped");
        }));
    }

    /// Flag the loop to stop and join the thread. The stop flag is checked
    /// at the top of every pass, so shutdown latency is bounded by one
    /// capture timeout. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Vision capture thread panicked");
            }
        }
    }

    /// Move the ROI origin. Takes effect on the next capture cycle, never
    /// mid-frame.
    pub fn set_roi(&self, x: u32, y: u32) {
        let mut shared = self.shared.lock().expect("vision lock poisoned");
        shared.roi.x = x;
        shared.roi.y = y;
        info!("ROI moved to ({x}, {y})");
    }

    #[must_use]
    pub fn roi(&self) -> Roi {
        self.shared.lock().expect("vision lock poisoned").roi
    }

    /// Centroids (ROI-local) of the requested class from the most recent
    /// publication. Empty before the first publication or when nothing
    /// matches; never blocks on the capture loop.
    #[must_use]
    pub fn detections(&self, class: BlockClass) -> Vec<(f32, f32)> {
        let snapshot = self.latest();
        match snapshot {
            None => Vec::new(),
            Some(snap) => snap
                .detections
                .iter()
                .filter(|d| d.class == class)
                .map(Detection::center)
                .collect(),
        }
    }

    /// Latest annotated frame as JPEG bytes; `None` before the first
    /// publication. Encoding happens outside the lock.
    #[must_use]
    pub fn frame_jpeg(&self) -> Option<Vec<u8>> {
        let snapshot = self.latest()?;
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
        match snapshot.frame.write_with_encoder(encoder) {
            Ok(()) => Some(buf),
            Err(e) => {
                warn!("JPEG encode failed: {e}");
                None
            }
        }
    }

    fn latest(&self) -> Option<Arc<Snapshot>> {
        self.shared.lock().expect("vision lock poisoned").snapshot.clone()
    }
}

/// One capture→infer→annotate→publish pass.
fn iterate(
    shared: &Mutex<Shared>,
    source: &mut dyn FrameSource,
    detector: &mut dyn Detector,
    capture_timeout: Duration,
) -> LoopStep {
    let roi = shared.lock().expect("vision lock poisoned").roi;

    let frame = match source.acquire(capture_timeout) {
        Ok(frame) => frame,
        Err(CaptureError::Aborted) => {
            info!("Frame acquisition aborted, leaving capture loop");
            return LoopStep::Stop;
        }
        Err(e) => {
            warn!("Frame acquisition failed: {e}");
            return LoopStep::Continue;
        }
    };

    let crop = roi.crop(&frame);
    let detections = match detector.infer(&crop) {
        Ok(detections) => detections,
        Err(e) => {
            warn!("Inference failed: {e}");
            return LoopStep::Continue;
        }
    };
    let detections: Vec<Detection> = detections
        .into_iter()
        .filter(|d| d.confidence >= CONFIDENCE_THRESHOLD)
        .collect();

    let annotated = annotate(&crop, &detections);
    let snapshot = Arc::new(Snapshot { frame: annotated, detections });
    shared.lock().expect("vision lock poisoned").snapshot = Some(snapshot);
    LoopStep::Continue
}
