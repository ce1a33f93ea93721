//! Frame Annotation Library
//!
//! Turns a video into annotated frames and aggregated detections, keeps the
//! playback state shared between an interactive foreground loop and its
//! background jobs, and exports the result as a re-encoded video and a
//! tabular detection report.

pub mod annotator;
pub mod config;
pub mod detector_registry;
pub mod detector_stub;
pub mod detector_trait;
pub mod error;
pub mod events;
pub mod export_utils;
pub mod image_utils;
pub mod jobs;
pub mod playback;
pub mod report;
pub mod session;
pub mod types;
pub mod video;
pub mod video_export;
pub mod workbench;

#[cfg(feature = "onnx")]
pub mod detector_yolov8;
#[cfg(feature = "opencv")]
pub mod video_opencv;

#[cfg(test)]
pub(crate) mod test_support;

pub use annotator::{Annotator, RunSummary};
pub use config::{AppConfig, DetectionPolicy, OverlayStyle, ReportFormat, VariantConfig};
pub use detector_registry::{DetectorRegistry, SharedDetector};
pub use detector_stub::ScriptedDetector;
pub use detector_trait::{Detector, DetectorAdapter};
pub use error::{AnnotatorError, Result};
pub use events::{AppEvent, BrowseTarget, EventPublisher, JobKind, JobOutcome};
pub use jobs::{JobOrchestrator, LaunchOutcome};
pub use playback::{CursorState, PlaybackCursor};
pub use report::{build_report, export_report, format_timestamp, ReportRow};
pub use session::{AnnotationSession, SessionPaths, SessionSnapshot};
pub use types::{AnnotatedFrame, Detection, DetectorConfig, Frame, RawDetection};
pub use video::{DecodedVideo, FrameSource, VideoEncoder, VideoSink};
pub use video_export::export_video;
pub use workbench::{Flow, PathPicker, UiEvent, Workbench};

#[cfg(feature = "onnx")]
pub use detector_yolov8::YoloV8Detector;
#[cfg(feature = "opencv")]
pub use video_opencv::{OpenCvFrameSource, OpenCvVideoEncoder};

/// Initialize the annotation library
pub fn init() -> Result<()> {
    log::info!("Frame annotator {} initialized", version());
    Ok(())
}

/// Get library version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
