//! Annotation session: the state accumulated by one load+annotate run
//!
//! Only the load+annotate job mutates the pipeline data. Each frame's
//! annotated image, detections and detection count are committed under one
//! write lock, so readers (exporters, render requests) always observe a
//! consistent prefix:
//!
//! - `annotated.len() == pred_lengths.len()`
//! - `pred_lengths.iter().sum() == detections.len()`
//! - `pred_lengths[i]` equals the number of detections with `frame_index == i`

use crate::error::{AnnotatorError, Result};
use crate::types::{AnnotatedFrame, Detection, Frame};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
struct SessionData {
    frames: Arc<Vec<Frame>>,
    annotated: Vec<AnnotatedFrame>,
    detections: Vec<Detection>,
    pred_lengths: Vec<usize>,
    frame_rate: f64,
    generation: u64,
}

/// Operator-supplied input and output locations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPaths {
    pub input: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub output_file: String,
}

/// Read-only copy of the session at one observation point
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub frame_count: usize,
    pub annotated: Vec<AnnotatedFrame>,
    pub detections: Vec<Detection>,
    pub pred_lengths: Vec<usize>,
    pub frame_rate: f64,
    /// Increments every time the session is reset by a new run
    pub generation: u64,
}

impl SessionSnapshot {
    pub fn is_consistent(&self) -> bool {
        consistent(&self.annotated, &self.detections, &self.pred_lengths)
    }
}

#[derive(Debug, Default)]
pub struct AnnotationSession {
    data: RwLock<SessionData>,
    paths: RwLock<SessionPaths>,
}

impl AnnotationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all pipeline data with a freshly decoded video.
    ///
    /// Paths are kept; everything else from the previous run is dropped.
    pub fn reset(&self, frames: Vec<Frame>, frame_rate: f64) -> Arc<Vec<Frame>> {
        let frames = Arc::new(frames);
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let generation = data.generation + 1;
        *data = SessionData {
            frames: Arc::clone(&frames),
            annotated: Vec::with_capacity(frames.len()),
            detections: Vec::new(),
            pred_lengths: Vec::with_capacity(frames.len()),
            frame_rate,
            generation,
        };
        log::debug!(
            "Session reset (generation {}, {} frames @ {:.2} FPS)",
            generation,
            frames.len(),
            frame_rate
        );
        frames
    }

    /// Commit one annotated frame and its detections as a single step.
    ///
    /// Frames must arrive in strict index order and every detection must
    /// belong to that frame; anything else is rejected without touching the
    /// session.
    pub fn append(&self, annotated: AnnotatedFrame, detections: Vec<Detection>) -> Result<()> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);

        let expected = data.annotated.len();
        if annotated.index != expected {
            return Err(AnnotatorError::other(format!(
                "out of order append: expected frame {}, got {}",
                expected, annotated.index
            )));
        }
        if expected >= data.frames.len() {
            return Err(AnnotatorError::other(format!(
                "append past the end of the source ({} frames)",
                data.frames.len()
            )));
        }
        if let Some(stray) = detections.iter().find(|d| d.frame_index != expected) {
            return Err(AnnotatorError::other(format!(
                "detection for frame {} appended with frame {}",
                stray.frame_index, expected
            )));
        }

        data.pred_lengths.push(detections.len());
        data.detections.extend(detections);
        data.annotated.push(annotated);
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        SessionSnapshot {
            frame_count: data.frames.len(),
            annotated: data.annotated.clone(),
            detections: data.detections.clone(),
            pred_lengths: data.pred_lengths.clone(),
            frame_rate: data.frame_rate,
            generation: data.generation,
        }
    }

    pub fn annotated_frame(&self, index: usize) -> Option<AnnotatedFrame> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.annotated.get(index).cloned()
    }

    pub fn annotated_len(&self) -> usize {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .annotated
            .len()
    }

    pub fn frame_count(&self) -> usize {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .frames
            .len()
    }

    pub fn frame_rate(&self) -> f64 {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .frame_rate
    }

    pub fn pred_lengths(&self) -> Vec<usize> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .pred_lengths
            .clone()
    }

    pub fn paths(&self) -> SessionPaths {
        self.paths
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_input_path(&self, path: Option<PathBuf>) {
        self.paths.write().unwrap_or_else(PoisonError::into_inner).input = path;
    }

    pub fn set_output_dir(&self, path: Option<PathBuf>) {
        self.paths
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .output_dir = path;
    }

    pub fn set_output_file(&self, name: &str) {
        self.paths
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .output_file = name.to_string();
    }

    pub fn is_consistent(&self) -> bool {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        consistent(&data.annotated, &data.detections, &data.pred_lengths)
    }
}

fn consistent(annotated: &[AnnotatedFrame], detections: &[Detection], pred_lengths: &[usize]) -> bool {
    if annotated.len() != pred_lengths.len() {
        return false;
    }
    if pred_lengths.iter().sum::<usize>() != detections.len() {
        return false;
    }

    // Detections are stored frame by frame, so each frame owns one contiguous run
    let mut offset = 0;
    for (index, &count) in pred_lengths.iter().enumerate() {
        if detections[offset..offset + count]
            .iter()
            .any(|d| d.frame_index != index)
        {
            return false;
        }
        offset += count;
    }
    true
}
