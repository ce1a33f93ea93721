//! Re-encodes annotated frames to a single video container

use crate::error::{AnnotatorError, Result};
use crate::export_utils::{ensure_parent_dir, normalize_extension};
use crate::types::AnnotatedFrame;
use crate::video::VideoEncoder;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const VIDEO_EXTENSION: &str = "mp4";

/// Encode `frames` in order at `frame_rate` and return the written path.
///
/// Every frame must match the first frame's dimensions. On any error the
/// partially written file must be treated as unusable.
pub fn export_video(
    encoder: &dyn VideoEncoder,
    path: &Path,
    frame_rate: f64,
    frames: &[AnnotatedFrame],
) -> Result<PathBuf> {
    let first = frames.first().ok_or(AnnotatorError::NoFrames)?;
    if frame_rate <= 0.0 || !frame_rate.is_finite() {
        return Err(AnnotatorError::InvalidFrameRate(frame_rate));
    }

    let path = normalize_extension(path, VIDEO_EXTENSION);
    ensure_parent_dir(&path)?;

    let size = first.dimensions();
    let start = Instant::now();
    let mut sink = encoder.create(&path, frame_rate, size)?;

    for frame in frames {
        if frame.dimensions() != size {
            let (w, h) = frame.dimensions();
            return Err(AnnotatorError::encode(format!(
                "Frame {} is {}x{}, expected {}x{}",
                frame.index, w, h, size.0, size.1
            )));
        }
        sink.write(&frame.image)?;
    }
    sink.finish()?;

    log::info!(
        "Exported {} frames to {} in {:.2}s",
        frames.len(),
        path.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(path)
}
