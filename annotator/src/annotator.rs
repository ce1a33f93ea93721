/// Frame annotator: detect -> overlay -> commit -> publish, one frame at a time
///
/// Frames are processed in strict index order on the calling thread. Frame
/// `i` is committed to the session and its progress published before frame
/// `i + 1` is handed to the detector. A detector failure stops the run; the
/// session keeps every frame committed before the failure.
use crate::config::{DetectionPolicy, OverlayStyle};
use crate::detector_trait::{Detector, DetectorAdapter};
use crate::error::Result;
use crate::events::EventPublisher;
use crate::image_utils::draw_detections;
use crate::playback::PlaybackCursor;
use crate::session::AnnotationSession;
use crate::types::{AnnotatedFrame, Detection, Frame};
use std::time::{Duration, Instant};

/// Statistics for a completed annotation run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: usize,
    pub detections: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn average_fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Annotator {
    policy: DetectionPolicy,
    overlay: OverlayStyle,
}

impl Annotator {
    pub fn new(policy: DetectionPolicy, overlay: OverlayStyle) -> Self {
        Self { policy, overlay }
    }

    /// Detect on one frame and bake the boxes onto a copy of it
    pub fn annotate_frame(
        &self,
        adapter: &mut DetectorAdapter<'_>,
        frame: &Frame,
    ) -> Result<(AnnotatedFrame, Vec<Detection>)> {
        let detections = adapter.detect(frame.index, &frame.image)?;
        let overlay = draw_detections(&frame.image, &detections, &self.overlay);
        Ok((AnnotatedFrame::new(frame.index, overlay), detections))
    }

    /// Annotate every frame into `session`.
    ///
    /// `frames` must be the sequence the session was last reset with.
    pub fn run(
        &self,
        detector: &mut dyn Detector,
        frames: &[Frame],
        session: &AnnotationSession,
        cursor: &PlaybackCursor,
        events: &EventPublisher,
    ) -> Result<RunSummary> {
        let start = Instant::now();
        let total = frames.len();
        let mut adapter = DetectorAdapter::new(detector, self.policy.clone());
        let mut detections_total = 0_usize;

        log::info!(
            "Annotating {} frames with '{}'",
            total,
            adapter.detector_name()
        );
        events.progress(0, total);

        for frame in frames {
            let (annotated, detections) = self.annotate_frame(&mut adapter, frame)?;
            let index = annotated.index;
            let image = annotated.image.clone();
            detections_total += detections.len();

            session.append(annotated, detections)?;
            events.progress(index + 1, total);

            if cursor.follow_to(index) {
                events.render(index, &image);
            }

            if (index + 1) % 100 == 0 {
                let elapsed = start.elapsed().as_secs_f64();
                log::info!(
                    "Annotator: {}/{} frames, {} detections ({:.1} FPS)",
                    index + 1,
                    total,
                    detections_total,
                    (index + 1) as f64 / elapsed.max(f64::EPSILON)
                );
            }
        }

        let summary = RunSummary {
            frames: total,
            detections: detections_total,
            elapsed: start.elapsed(),
        };
        log::info!(
            "Annotation finished: {} frames, {} detections in {:.2}s ({:.1} FPS)",
            summary.frames,
            summary.detections,
            summary.elapsed.as_secs_f64(),
            summary.average_fps()
        );
        Ok(summary)
    }
}
