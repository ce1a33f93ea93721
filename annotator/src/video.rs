//! Video decode and encode capabilities
//!
//! The pipeline only sees these traits. Container and codec handling lives in
//! the backends (`video_opencv` behind the `opencv` feature, in-memory fakes
//! in tests).

use crate::error::Result;
use crate::types::Frame;
use image::RgbImage;
use std::path::Path;

/// Fully decoded source video
#[derive(Debug, Clone)]
pub struct DecodedVideo {
    /// Frames in source order, indexed from 0
    pub frames: Vec<Frame>,
    pub frame_rate: f64,
}

impl DecodedVideo {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Decodes a video file into a finite, ordered frame sequence
pub trait FrameSource: Send + Sync {
    /// Decode every frame of `path`.
    ///
    /// `on_frame` is called with the number of frames decoded so far.
    /// A missing, unreadable or empty source is `InvalidSource`.
    fn open(&self, path: &Path, on_frame: &mut dyn FnMut(usize)) -> Result<DecodedVideo>;
}

/// Creates encoded video files
pub trait VideoEncoder: Send + Sync {
    /// Open a sink writing `size` frames at `frame_rate` to `path`
    fn create(&self, path: &Path, frame_rate: f64, size: (u32, u32)) -> Result<Box<dyn VideoSink>>;
}

/// An open video file accepting frames in order
pub trait VideoSink: Send {
    fn write(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush and close the container
    fn finish(self: Box<Self>) -> Result<()>;
}
