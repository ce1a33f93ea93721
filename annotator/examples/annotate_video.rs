/// Headless Annotation Example
///
/// Drives the workbench the way an interactive front end would, but from the
/// command line:
/// 1. Load + annotate the input video with the selected model variant
/// 2. Export the annotated video and the detection report
///
/// Usage:
///   cargo run --release --features opencv,onnx --example annotate_video -- \
///       <video> --output-dir out --name run [--variant "YOLO Multi-Class"] [--csv]
use clap::Parser;
use frame_annotator::{
    AppConfig, AppEvent, DetectorRegistry, EventPublisher, JobKind, JobOutcome, OpenCvFrameSource,
    OpenCvVideoEncoder, PathPicker, ReportFormat, UiEvent, Workbench,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "annotate_video", about = "Annotate a video and export the results")]
struct Args {
    /// Input video file
    input: PathBuf,

    /// Folder receiving the exported video and report
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Output filename (extensions are added when missing)
    #[arg(short, long, default_value = "annotated")]
    name: String,

    /// Model variant to annotate with
    #[arg(short, long)]
    variant: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the report as CSV instead of XLSX
    #[arg(long)]
    csv: bool,
}

/// No dialogs when running headless
struct NoDialogs;

impl PathPicker for NoDialogs {
    fn pick_video(&self) -> Option<PathBuf> {
        None
    }

    fn pick_folder(&self) -> Option<PathBuf> {
        None
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    frame_annotator::init()?;

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    if args.csv {
        config.report_format = ReportFormat::Csv;
    }

    let registry = DetectorRegistry::load_yolov8(&config)?;
    let (events, rx) = EventPublisher::channel(config.display_size);
    let mut bench = Workbench::new(
        config,
        registry,
        Arc::new(OpenCvFrameSource::new()),
        Arc::new(OpenCvVideoEncoder::new()),
        Arc::new(NoDialogs),
        events,
    )?;

    bench.handle(UiEvent::SetInputPath(args.input));
    bench.handle(UiEvent::SetOutputDir(args.output_dir));
    bench.handle(UiEvent::SetOutputFile(args.name));
    if let Some(variant) = args.variant {
        bench.handle(UiEvent::SelectVariant(variant));
    }
    bench.handle(UiEvent::StartAnnotating);

    let mut exports_pending = 0;
    let mut failed = false;

    for event in rx.iter() {
        match event {
            AppEvent::Status(message) => eprintln!("\n{}", message),
            AppEvent::Progress { completed, total } => {
                eprint!("\r  {}/{} frames", completed, total);
                io::stderr().flush()?;
            }
            AppEvent::JobFinished { kind, outcome } => {
                if let JobOutcome::Failed(reason) = &outcome {
                    eprintln!("\n{} failed: {}", kind, reason);
                    failed = true;
                }
                match kind {
                    JobKind::LoadAnnotate if outcome == JobOutcome::Succeeded => {
                        bench.handle(UiEvent::SaveVideo);
                        bench.handle(UiEvent::SaveReport);
                        exports_pending = 2;
                    }
                    JobKind::ExportVideo | JobKind::ExportReport => exports_pending -= 1,
                    _ => {}
                }
                if exports_pending == 0 {
                    break;
                }
            }
            AppEvent::Render { .. } | AppEvent::PathSelected { .. } => {}
        }
    }

    bench.handle(UiEvent::Exit);
    bench.shutdown(Duration::from_secs(5));

    if failed {
        return Err("annotation run failed".into());
    }
    Ok(())
}
