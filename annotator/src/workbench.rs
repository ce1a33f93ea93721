//! Foreground controller
//!
//! `Workbench::handle` processes one operator event at a time and returns
//! immediately: anything long-running is handed to the job orchestrator,
//! and everything the UI should show arrives on the event channel.

use crate::annotator::Annotator;
use crate::config::{AppConfig, ReportFormat};
use crate::detector_registry::{DetectorRegistry, SharedDetector};
use crate::error::{AnnotatorError, Result};
use crate::events::{BrowseTarget, EventPublisher, JobKind};
use crate::jobs::{JobOrchestrator, LaunchOutcome};
use crate::playback::{CursorState, PlaybackCursor};
use crate::report::export_report;
use crate::session::{AnnotationSession, SessionPaths};
use crate::video::{FrameSource, VideoEncoder};
use crate::video_export::export_video;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

pub const STATUS_LOADING: &str = "Loading Frames";
pub const STATUS_INVALID_PATH: &str = "Video Path Invalid";
pub const STATUS_ANNOTATING: &str = "Annotating Frames";
pub const STATUS_ANNOTATED: &str = "Annotation Complete";
pub const STATUS_SAVING_VIDEO: &str = "Saving Video";
pub const STATUS_SAVING_SHEET: &str = "Saving Sheet";
pub const STATUS_SAVED: &str = "Saving Complete";
pub const STATUS_NO_VIDEO: &str = "No video selected";
pub const STATUS_NO_FOLDER: &str = "No folder selected";

/// External file and directory dialogs
pub trait PathPicker: Send + Sync {
    fn pick_video(&self) -> Option<PathBuf>;
    fn pick_folder(&self) -> Option<PathBuf>;
}

/// Operator actions
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    BrowseInput,
    BrowseOutput,
    SetInputPath(PathBuf),
    SetOutputDir(PathBuf),
    SetOutputFile(String),
    SelectVariant(String),
    StartAnnotating,
    /// Slider moved to an index
    ScrubTo(usize),
    NextFrame,
    TogglePlay,
    SaveVideo,
    SaveReport,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Workbench {
    config: AppConfig,
    registry: DetectorRegistry,
    variant: String,
    source: Arc<dyn FrameSource>,
    encoder: Arc<dyn VideoEncoder>,
    picker: Arc<dyn PathPicker>,
    session: Arc<AnnotationSession>,
    cursor: Arc<PlaybackCursor>,
    events: EventPublisher,
    jobs: JobOrchestrator,
}

impl Workbench {
    pub fn new(
        config: AppConfig,
        registry: DetectorRegistry,
        source: Arc<dyn FrameSource>,
        encoder: Arc<dyn VideoEncoder>,
        picker: Arc<dyn PathPicker>,
        events: EventPublisher,
    ) -> Result<Self> {
        config.validate()?;
        if !registry.contains(&config.default_variant) {
            return Err(AnnotatorError::config(format!(
                "default variant '{}' has no loaded detector",
                config.default_variant
            )));
        }

        let jobs = JobOrchestrator::new(events.clone())?;
        log::info!(
            "Workbench ready: variants {:?}, default '{}'",
            registry.names(),
            config.default_variant
        );

        Ok(Self {
            variant: config.default_variant.clone(),
            config,
            registry,
            source,
            encoder,
            picker,
            session: Arc::new(AnnotationSession::new()),
            cursor: Arc::new(PlaybackCursor::new()),
            events,
            jobs,
        })
    }

    pub fn session(&self) -> &AnnotationSession {
        &self.session
    }

    pub fn cursor(&self) -> CursorState {
        self.cursor.load()
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn jobs(&self) -> &JobOrchestrator {
        &self.jobs
    }

    pub fn handle(&mut self, event: UiEvent) -> Flow {
        log::debug!("UI event: {:?}", event);
        match event {
            UiEvent::BrowseInput => self.browse(BrowseTarget::InputVideo),
            UiEvent::BrowseOutput => self.browse(BrowseTarget::OutputFolder),
            UiEvent::SetInputPath(path) => self.session.set_input_path(Some(path)),
            UiEvent::SetOutputDir(path) => self.session.set_output_dir(Some(path)),
            UiEvent::SetOutputFile(name) => self.session.set_output_file(&name),
            UiEvent::SelectVariant(name) => self.select_variant(name),
            UiEvent::StartAnnotating => self.start_annotating(),
            UiEvent::ScrubTo(index) => self.show_manual(index),
            UiEvent::NextFrame => {
                let next = self.cursor.load().index + 1;
                let last = self.session.frame_count().saturating_sub(1);
                self.show_manual(next.min(last));
            }
            UiEvent::TogglePlay => self.toggle_play(),
            UiEvent::SaveVideo => self.save_video(),
            UiEvent::SaveReport => self.save_report(),
            UiEvent::Exit => return Flow::Exit,
        }
        Flow::Continue
    }

    /// Stop the background runtime
    pub fn shutdown(self, timeout: Duration) {
        self.jobs.shutdown(timeout);
    }

    fn launch<F>(&self, kind: JobKind, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        if self.jobs.launch(kind, task) == LaunchOutcome::AlreadyRunning {
            log::info!("{} is already running", kind);
        }
    }

    fn browse(&self, target: BrowseTarget) {
        let picker = Arc::clone(&self.picker);
        let session = Arc::clone(&self.session);
        let events = self.events.clone();

        self.launch(JobKind::Browse, move || {
            let picked = match target {
                BrowseTarget::InputVideo => picker.pick_video(),
                BrowseTarget::OutputFolder => picker.pick_folder(),
            };
            match (target, picked) {
                (BrowseTarget::InputVideo, Some(path)) => {
                    session.set_input_path(Some(path.clone()));
                    events.status(format!("Selected video {}", path.display()));
                    events.path_selected(target, path);
                }
                (BrowseTarget::OutputFolder, Some(path)) => {
                    session.set_output_dir(Some(path.clone()));
                    events.status(format!("Selected folder {}", path.display()));
                    events.path_selected(target, path);
                }
                (BrowseTarget::InputVideo, None) => events.status(STATUS_NO_VIDEO),
                (BrowseTarget::OutputFolder, None) => events.status(STATUS_NO_FOLDER),
            }
            Ok(())
        });
    }

    fn select_variant(&mut self, name: String) {
        if self.jobs.is_running(JobKind::LoadAnnotate) {
            self.events
                .status(format!("Cannot switch to '{}' while annotating", name));
            return;
        }
        if !self.registry.contains(&name) {
            self.events.status(format!("Unknown model variant '{}'", name));
            return;
        }
        log::info!("Model variant set to '{}'", name);
        self.variant = name;
    }

    fn start_annotating(&self) {
        let detector = match self.registry.get(&self.variant) {
            Ok(detector) => detector,
            Err(e) => {
                self.events.status(e.to_string());
                return;
            }
        };
        let input = self.session.paths().input;
        let annotator = Annotator::new(self.config.detection.clone(), self.config.overlay.clone());
        let source = Arc::clone(&self.source);
        let session = Arc::clone(&self.session);
        let cursor = Arc::clone(&self.cursor);
        let events = self.events.clone();

        self.launch(JobKind::LoadAnnotate, move || {
            load_and_annotate(
                &annotator,
                detector,
                source.as_ref(),
                input,
                &session,
                &cursor,
                &events,
            )
        });
    }

    fn show_manual(&self, index: usize) {
        self.cursor.seek_manual(index);
        if let Some(frame) = self.session.annotated_frame(index) {
            self.events.render(index, &frame.image);
        }
    }

    fn toggle_play(&self) {
        let state = self.cursor.toggle_follow();
        if !state.follow {
            return;
        }
        // Resuming jumps to the newest annotated frame
        let annotated = self.session.annotated_len();
        if annotated > 0 && self.cursor.follow_to(annotated - 1) {
            if let Some(frame) = self.session.annotated_frame(annotated - 1) {
                self.events.render(annotated - 1, &frame.image);
            }
        }
    }

    fn save_video(&self) {
        let session = Arc::clone(&self.session);
        let encoder = Arc::clone(&self.encoder);
        let events = self.events.clone();

        self.launch(JobKind::ExportVideo, move || {
            let target = output_target(&session.paths())?;
            events.status(STATUS_SAVING_VIDEO);
            let snapshot = session.snapshot();
            export_video(encoder.as_ref(), &target, snapshot.frame_rate, &snapshot.annotated)?;
            events.status(STATUS_SAVED);
            Ok(())
        });
    }

    fn save_report(&self) {
        let session = Arc::clone(&self.session);
        let format: ReportFormat = self.config.report_format;
        let events = self.events.clone();

        self.launch(JobKind::ExportReport, move || {
            let target = output_target(&session.paths())?;
            events.status(STATUS_SAVING_SHEET);
            export_report(&target, &session.snapshot(), format)?;
            events.status(STATUS_SAVED);
            Ok(())
        });
    }
}

/// Output folder joined with the output filename, before extension fix-up
fn output_target(paths: &SessionPaths) -> Result<PathBuf> {
    let dir = paths
        .output_dir
        .as_ref()
        .ok_or_else(|| AnnotatorError::config(STATUS_NO_FOLDER))?;
    let name = paths.output_file.trim();
    if name.is_empty() {
        return Err(AnnotatorError::config("No output filename"));
    }
    Ok(dir.join(name))
}

/// Decoded frames between two loading status updates
const LOADING_STEP: usize = 100;

fn loading_status(count: usize) -> String {
    format!("{} ({} frames)", STATUS_LOADING, count)
}

/// Body of the load+annotate job.
///
/// An unreadable source is reported and leaves an empty session behind; it
/// does not fail the job.
fn load_and_annotate(
    annotator: &Annotator,
    detector: SharedDetector,
    source: &dyn FrameSource,
    input: Option<PathBuf>,
    session: &AnnotationSession,
    cursor: &PlaybackCursor,
    events: &EventPublisher,
) -> Result<()> {
    events.status(STATUS_LOADING);

    let decoded = match input {
        Some(path) => source.open(&path, &mut |count| {
            if count % LOADING_STEP == 0 {
                log::debug!("Loaded {} frames", count);
                events.status(loading_status(count));
            }
        }),
        None => Err(AnnotatorError::invalid_source("no input path")),
    };

    let mut detector = detector.lock().unwrap_or_else(PoisonError::into_inner);

    match decoded {
        Ok(video) => {
            let frames = session.reset(video.frames, video.frame_rate);
            events.status(STATUS_ANNOTATING);
            annotator.run(detector.as_mut(), &frames, session, cursor, events)?;
            events.status(STATUS_ANNOTATED);
        }
        Err(e) => {
            log::warn!("Failed to load video: {}", e);
            events.status(STATUS_INVALID_PATH);
            let frames = session.reset(Vec::new(), 0.0);
            annotator.run(detector.as_mut(), &frames, session, cursor, events)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector_stub::ScriptedDetector;
    use crate::detector_trait::Detector;
    use crate::events::{AppEvent, JobOutcome};
    use crate::test_support::{FixedPicker, MemoryEncoder, MemorySource};
    use crate::types::RawDetection;
    use crossbeam::channel::{bounded, Receiver};
    use image::RgbImage;

    fn script() -> ScriptedDetector {
        ScriptedDetector::new(vec![
            vec![RawDetection::new(0, 0.9, 1.0, 2.0, 5.0, 6.0)],
            vec![RawDetection::new(0, 0.1, 1.0, 1.0, 4.0, 4.0)],
            vec![
                RawDetection::new(0, 0.8, 2.0, 2.0, 6.0, 6.0),
                RawDetection::new(0, 0.7, 8.0, 8.0, 12.0, 12.0),
            ],
        ])
    }

    struct Fixture {
        bench: Workbench,
        rx: Receiver<AppEvent>,
        encoder: MemoryEncoder,
        dir: tempfile::TempDir,
    }

    fn fixture(detector: Box<dyn Detector>, picker: FixedPicker) -> Fixture {
        let config = AppConfig {
            report_format: ReportFormat::Csv,
            ..AppConfig::default()
        };
        let mut registry = DetectorRegistry::new();
        registry.register("YOLO Base", detector).unwrap();
        registry
            .register("YOLO Resilient", Box::new(ScriptedDetector::new(vec![])))
            .unwrap();

        let source = MemorySource::new()
            .with_video("clip.mp4", 3, (16, 12), 30.0)
            .with_video("long.mp4", 250, (4, 4), 30.0);
        let encoder = MemoryEncoder::new();
        let (events, rx) = EventPublisher::channel((8, 6));
        let bench = Workbench::new(
            config,
            registry,
            Arc::new(source),
            Arc::new(encoder.clone()),
            Arc::new(picker),
            events,
        )
        .unwrap();

        Fixture {
            bench,
            rx,
            encoder,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn statuses(rx: &Receiver<AppEvent>) -> Vec<String> {
        rx.try_iter()
            .filter_map(|e| match e {
                AppEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_annotate_then_export() {
        let mut fx = fixture(Box::new(script()), FixedPicker::default());
        let bench = &mut fx.bench;

        bench.handle(UiEvent::SetInputPath(PathBuf::from("clip.mp4")));
        bench.handle(UiEvent::StartAnnotating);
        bench.jobs().wait(JobKind::LoadAnnotate).unwrap();

        assert_eq!(bench.session().pred_lengths(), vec![1, 0, 2]);
        assert_eq!(bench.cursor(), CursorState { index: 2, follow: true });
        assert_eq!(
            statuses(&fx.rx),
            vec![STATUS_LOADING, STATUS_ANNOTATING, STATUS_ANNOTATED]
        );

        bench.handle(UiEvent::SetOutputDir(fx.dir.path().to_path_buf()));
        bench.handle(UiEvent::SetOutputFile("run".to_string()));
        bench.handle(UiEvent::SaveReport);
        bench.handle(UiEvent::SaveVideo);
        bench.jobs().wait_all().unwrap();

        let report = std::fs::read_to_string(fx.dir.path().join("run.csv")).unwrap();
        let labels: Vec<&str> = report
            .lines()
            .skip(1)
            .map(|line| line.rsplitn(5, ',').last().unwrap())
            .collect();
        assert_eq!(
            labels,
            vec![
                "\"Frame: 0, Timestamp: 00:00.000\"",
                "\"Frame: 2, Timestamp: 00:00.067\"",
                "\"Frame: 2, Timestamp: 00:00.067\"",
            ]
        );

        let videos = fx.encoder.finished();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].path, fx.dir.path().join("run.mp4"));
        assert_eq!(videos[0].frames.len(), 3);
        assert_eq!(videos[0].frame_rate, 30.0);

        let saved = statuses(&fx.rx);
        assert_eq!(saved.iter().filter(|s| *s == STATUS_SAVED).count(), 2);
    }

    #[test]
    fn test_long_decode_reports_loading_progress() {
        let mut fx = fixture(Box::new(script()), FixedPicker::default());
        let bench = &mut fx.bench;

        bench.handle(UiEvent::SetInputPath(PathBuf::from("long.mp4")));
        bench.handle(UiEvent::StartAnnotating);
        bench.jobs().wait(JobKind::LoadAnnotate).unwrap();

        assert_eq!(bench.session().frame_count(), 250);
        assert_eq!(
            statuses(&fx.rx),
            vec![
                STATUS_LOADING.to_string(),
                loading_status(100),
                loading_status(200),
                STATUS_ANNOTATING.to_string(),
                STATUS_ANNOTATED.to_string(),
            ]
        );
    }

    #[test]
    fn test_invalid_path_leaves_empty_session() {
        let mut fx = fixture(Box::new(script()), FixedPicker::default());
        let bench = &mut fx.bench;

        bench.handle(UiEvent::SetInputPath(PathBuf::from("missing.mp4")));
        bench.handle(UiEvent::StartAnnotating);
        bench.jobs().wait(JobKind::LoadAnnotate).unwrap();

        assert_eq!(bench.session().frame_count(), 0);
        let events: Vec<AppEvent> = fx.rx.try_iter().collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, AppEvent::Status(s) if s == STATUS_INVALID_PATH)));
        assert!(events.iter().any(|e| matches!(
            e,
            AppEvent::JobFinished {
                kind: JobKind::LoadAnnotate,
                outcome: JobOutcome::Succeeded
            }
        )));

        // Exporting the empty session fails without writing anything
        bench.handle(UiEvent::SetOutputDir(fx.dir.path().to_path_buf()));
        bench.handle(UiEvent::SetOutputFile("empty".to_string()));
        bench.handle(UiEvent::SaveReport);
        bench.handle(UiEvent::SaveVideo);
        bench.jobs().wait_all().unwrap();

        let statuses = statuses(&fx.rx);
        assert!(statuses.contains(&"No detections to export".to_string()));
        assert!(statuses.contains(&"No annotated frames to export".to_string()));
        assert_eq!(std::fs::read_dir(fx.dir.path()).unwrap().count(), 0);
        assert!(fx.encoder.finished().is_empty());
    }

    #[test]
    fn test_browse_updates_paths() {
        let picker = FixedPicker {
            video: Some(PathBuf::from("clip.mp4")),
            folder: None,
        };
        let mut fx = fixture(Box::new(script()), picker);
        let bench = &mut fx.bench;

        bench.handle(UiEvent::BrowseInput);
        bench.jobs().wait(JobKind::Browse).unwrap();
        bench.handle(UiEvent::BrowseOutput);
        bench.jobs().wait(JobKind::Browse).unwrap();

        assert_eq!(bench.session().paths().input, Some(PathBuf::from("clip.mp4")));
        assert_eq!(bench.session().paths().output_dir, None);

        let events: Vec<AppEvent> = fx.rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            AppEvent::PathSelected {
                target: BrowseTarget::InputVideo,
                ..
            }
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, AppEvent::Status(s) if s == STATUS_NO_FOLDER)));
    }

    /// Detector that holds the run open until released
    struct GatedDetector {
        release: Receiver<()>,
    }

    impl Detector for GatedDetector {
        fn detect(&mut self, _image: &RgbImage) -> std::result::Result<Vec<RawDetection>, String> {
            let _ = self.release.recv();
            Ok(vec![])
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    #[test]
    fn test_variant_locked_while_annotating() {
        let (release_tx, release_rx) = bounded::<()>(0);
        let mut fx = fixture(
            Box::new(GatedDetector {
                release: release_rx,
            }),
            FixedPicker::default(),
        );
        let bench = &mut fx.bench;

        bench.handle(UiEvent::SetInputPath(PathBuf::from("clip.mp4")));
        bench.handle(UiEvent::StartAnnotating);
        assert!(bench.jobs().is_running(JobKind::LoadAnnotate));

        bench.handle(UiEvent::SelectVariant("YOLO Resilient".to_string()));
        assert_eq!(bench.variant(), "YOLO Base");

        drop(release_tx);
        bench.jobs().wait(JobKind::LoadAnnotate).unwrap();
        assert_eq!(bench.session().annotated_len(), 3);

        bench.handle(UiEvent::SelectVariant("YOLO Resilient".to_string()));
        assert_eq!(bench.variant(), "YOLO Resilient");
        bench.handle(UiEvent::SelectVariant("YOLO Unknown".to_string()));
        assert_eq!(bench.variant(), "YOLO Resilient");

        let statuses = statuses(&fx.rx);
        assert!(statuses.iter().any(|s| s.starts_with("Cannot switch")));
        assert!(statuses.iter().any(|s| s.starts_with("Unknown model variant")));
    }

    #[test]
    fn test_scrub_next_and_play() {
        let mut fx = fixture(Box::new(script()), FixedPicker::default());
        let bench = &mut fx.bench;
        bench.handle(UiEvent::SetInputPath(PathBuf::from("clip.mp4")));
        bench.handle(UiEvent::StartAnnotating);
        bench.jobs().wait(JobKind::LoadAnnotate).unwrap();
        fx.rx.try_iter().for_each(drop);

        bench.handle(UiEvent::ScrubTo(0));
        bench.handle(UiEvent::NextFrame);
        bench.handle(UiEvent::NextFrame);
        bench.handle(UiEvent::NextFrame);
        assert_eq!(bench.cursor(), CursorState { index: 2, follow: false });

        // Out of range scrub moves the cursor but renders nothing
        bench.handle(UiEvent::ScrubTo(10));

        let renders: Vec<(usize, (u32, u32))> = fx
            .rx
            .try_iter()
            .filter_map(|e| match e {
                AppEvent::Render { index, image } => Some((index, image.dimensions())),
                _ => None,
            })
            .collect();
        assert_eq!(renders, vec![(0, (8, 6)), (1, (8, 6)), (2, (8, 6)), (2, (8, 6))]);

        bench.handle(UiEvent::TogglePlay);
        assert_eq!(bench.cursor(), CursorState { index: 2, follow: true });
        assert_eq!(bench.handle(UiEvent::Exit), Flow::Exit);
    }
}
