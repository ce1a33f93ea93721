//! Events pushed from the core to the UI layer
//!
//! The channel is unbounded: publishing never waits for the consumer, and a
//! consumer that went away only produces a debug log line.

use crate::image_utils::resize_for_display;
use crossbeam::channel::{unbounded, Receiver, Sender};
use image::RgbImage;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// The four long-running operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    LoadAnnotate,
    Browse,
    ExportVideo,
    ExportReport,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::LoadAnnotate,
        JobKind::Browse,
        JobKind::ExportVideo,
        JobKind::ExportReport,
    ];

    pub(crate) fn slot(self) -> usize {
        match self {
            Self::LoadAnnotate => 0,
            Self::Browse => 1,
            Self::ExportVideo => 2,
            Self::ExportReport => 3,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadAnnotate => write!(f, "load-annotate"),
            Self::Browse => write!(f, "browse"),
            Self::ExportVideo => write!(f, "export-video"),
            Self::ExportReport => write!(f, "export-report"),
        }
    }
}

/// Terminal state of one job instance
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
}

/// Which path field a browse job fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseTarget {
    InputVideo,
    OutputFolder,
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Human-readable status line
    Status(String),
    /// Annotation progress; `total` is also the current slider range
    Progress { completed: usize, total: usize },
    /// Display-sized raster ready for the canvas
    Render { index: usize, image: Arc<RgbImage> },
    /// A browse job resolved a path (the matching input field should update)
    PathSelected { target: BrowseTarget, path: PathBuf },
    JobFinished { kind: JobKind, outcome: JobOutcome },
}

#[derive(Clone)]
pub struct EventPublisher {
    tx: Sender<AppEvent>,
    display_size: (u32, u32),
}

impl EventPublisher {
    /// Create a publisher and the receiving end the UI drains
    pub fn channel(display_size: (u32, u32)) -> (Self, Receiver<AppEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx, display_size }, rx)
    }

    pub fn display_size(&self) -> (u32, u32) {
        self.display_size
    }

    pub fn status(&self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{}", message);
        self.send(AppEvent::Status(message));
    }

    pub fn progress(&self, completed: usize, total: usize) {
        self.send(AppEvent::Progress { completed, total });
    }

    /// Resize `image` to the display raster and hand it to the render sink
    pub fn render(&self, index: usize, image: &RgbImage) {
        let display = resize_for_display(image, self.display_size);
        self.send(AppEvent::Render {
            index,
            image: Arc::new(display),
        });
    }

    pub fn path_selected(&self, target: BrowseTarget, path: PathBuf) {
        self.send(AppEvent::PathSelected { target, path });
    }

    pub fn finished(&self, kind: JobKind, outcome: JobOutcome) {
        self.send(AppEvent::JobFinished { kind, outcome });
    }

    fn send(&self, event: AppEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("Event receiver dropped, discarding event");
        }
    }
}
