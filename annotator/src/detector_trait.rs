/// Unified detector trait for interchangeable model variants
///
/// Any backend (ONNX YOLOv8, a scripted stub, ...) plugs into the annotation
/// pipeline through this interface. Policy (class filter, confidence
/// threshold, coordinate normalisation) lives in `DetectorAdapter`, not in
/// the backends.
use crate::config::DetectionPolicy;
use crate::error::{AnnotatorError, Result};
use crate::types::{Detection, RawDetection};
use image::RgbImage;

/// Common interface for object detectors
pub trait Detector: Send {
    /// Detect objects in a single image, in source-image pixel coordinates
    fn detect(&mut self, image: &RgbImage) -> std::result::Result<Vec<RawDetection>, String>;

    /// Get the detector name (for logging/debugging)
    fn name(&self) -> &str;
}

/// Binds one detector to the detection policy for a single annotation run
pub struct DetectorAdapter<'a> {
    detector: &'a mut dyn Detector,
    policy: DetectionPolicy,
}

impl<'a> DetectorAdapter<'a> {
    pub fn new(detector: &'a mut dyn Detector, policy: DetectionPolicy) -> Self {
        Self { detector, policy }
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    pub fn policy(&self) -> &DetectionPolicy {
        &self.policy
    }

    /// Run the detector on one frame and return the accepted detections,
    /// in the order the detector returned them.
    pub fn detect(&mut self, frame_index: usize, image: &RgbImage) -> Result<Vec<Detection>> {
        if image.width() == 0 || image.height() == 0 {
            return Err(AnnotatorError::detection(frame_index, "empty frame"));
        }

        let raw = self
            .detector
            .detect(image)
            .map_err(|reason| AnnotatorError::detection(frame_index, reason))?;

        let total = raw.len();
        let accepted: Vec<Detection> = raw
            .into_iter()
            .filter(|det| det.class_id == self.policy.target_class)
            .filter(|det| det.confidence >= self.policy.confidence_threshold)
            .filter_map(|det| {
                let detection = Detection::from_corners(
                    frame_index,
                    (det.x1, det.y1),
                    (det.x2, det.y2),
                    det.confidence,
                );
                if detection.is_none() {
                    log::warn!(
                        "Frame {}: dropping degenerate box ({}, {}, {}, {})",
                        frame_index,
                        det.x1,
                        det.y1,
                        det.x2,
                        det.y2
                    );
                }
                detection
            })
            .collect();

        log::trace!(
            "Frame {}: {} of {} raw boxes accepted",
            frame_index,
            accepted.len(),
            total
        );
        Ok(accepted)
    }
}
