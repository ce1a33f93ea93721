//! In-memory collaborators for unit tests

use crate::error::{AnnotatorError, Result};
use crate::types::Frame;
use crate::video::{DecodedVideo, FrameSource, VideoEncoder, VideoSink};
use crate::workbench::PathPicker;
use image::{Rgb, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Frame source serving pre-registered synthetic videos
#[derive(Default)]
pub struct MemorySource {
    videos: HashMap<PathBuf, (usize, (u32, u32), f64)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(mut self, path: &str, frames: usize, size: (u32, u32), frame_rate: f64) -> Self {
        self.videos.insert(PathBuf::from(path), (frames, size, frame_rate));
        self
    }
}

impl FrameSource for MemorySource {
    fn open(&self, path: &Path, on_frame: &mut dyn FnMut(usize)) -> Result<DecodedVideo> {
        let (count, (w, h), frame_rate) = *self
            .videos
            .get(path)
            .ok_or_else(|| AnnotatorError::invalid_source(format!("No such file: {}", path.display())))?;

        let frames = (0..count)
            .map(|i| {
                let shade = (i % 256) as u8;
                on_frame(i + 1);
                Frame::new(i, RgbImage::from_pixel(w, h, Rgb([shade, shade, shade])))
            })
            .collect();
        Ok(DecodedVideo { frames, frame_rate })
    }
}

/// A video the `MemoryEncoder` finished writing
#[derive(Debug, Clone)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub frame_rate: f64,
    pub size: (u32, u32),
    pub frames: Vec<RgbImage>,
}

/// Encoder recording finished videos instead of writing files
#[derive(Clone, Default)]
pub struct MemoryEncoder {
    finished: Arc<Mutex<Vec<EncodedVideo>>>,
}

impl MemoryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finished(&self) -> Vec<EncodedVideo> {
        self.finished.lock().unwrap().clone()
    }
}

impl VideoEncoder for MemoryEncoder {
    fn create(&self, path: &Path, frame_rate: f64, size: (u32, u32)) -> Result<Box<dyn VideoSink>> {
        Ok(Box::new(MemorySink {
            video: EncodedVideo {
                path: path.to_path_buf(),
                frame_rate,
                size,
                frames: Vec::new(),
            },
            finished: Arc::clone(&self.finished),
        }))
    }
}

struct MemorySink {
    video: EncodedVideo,
    finished: Arc<Mutex<Vec<EncodedVideo>>>,
}

impl VideoSink for MemorySink {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        self.video.frames.push(frame.clone());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let MemorySink { video, finished } = *self;
        finished.lock().unwrap().push(video);
        Ok(())
    }
}

/// Path picker returning fixed answers
#[derive(Debug, Clone, Default)]
pub struct FixedPicker {
    pub video: Option<PathBuf>,
    pub folder: Option<PathBuf>,
}

impl PathPicker for FixedPicker {
    fn pick_video(&self) -> Option<PathBuf> {
        self.video.clone()
    }

    fn pick_folder(&self) -> Option<PathBuf> {
        self.folder.clone()
    }
}
