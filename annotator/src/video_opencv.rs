//! OpenCV-backed frame source and mp4 encoder

use crate::error::{AnnotatorError, Result};
use crate::types::Frame;
use crate::video::{DecodedVideo, FrameSource, VideoEncoder, VideoSink};
use image::RgbImage;
use opencv::{
    core::{Mat, Size, CV_8UC3},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter, CAP_ANY},
};
use std::path::Path;
use std::time::Instant;

/// Used when the container reports a non-positive frame rate
pub const FALLBACK_FPS: f64 = 20.0;

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| AnnotatorError::invalid_source(format!("Invalid path: {}", path.display())))
}

/// Convert an OpenCV BGR Mat to an RgbImage
fn mat_to_rgb_image(mat: &Mat) -> Result<RgbImage> {
    let width = mat.cols() as u32;
    let height = mat.rows() as u32;

    let mut rgb_mat = Mat::default();
    imgproc::cvt_color(
        mat,
        &mut rgb_mat,
        imgproc::COLOR_BGR2RGB,
        0,
        opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(|e| AnnotatorError::invalid_source(format!("Failed to convert BGR to RGB: {}", e)))?;

    let data = rgb_mat
        .data_bytes()
        .map_err(|e| AnnotatorError::invalid_source(format!("Failed to get image data: {}", e)))?
        .to_vec();

    RgbImage::from_vec(width, height, data)
        .ok_or_else(|| AnnotatorError::invalid_source("Failed to create RgbImage"))
}

/// Convert an RgbImage to an owned OpenCV BGR Mat
fn rgb_image_to_mat(image: &RgbImage) -> Result<Mat> {
    let data = image.as_raw();
    // The borrowed Mat never outlives `image`; cvt_color copies into `bgr_mat`
    let rgb_mat = unsafe {
        Mat::new_rows_cols_with_data_unsafe(
            image.height() as i32,
            image.width() as i32,
            CV_8UC3,
            data.as_ptr() as *mut _,
            opencv::core::Mat_AUTO_STEP,
        )
    }
    .map_err(|e| AnnotatorError::encode(format!("Failed to wrap frame: {}", e)))?;

    let mut bgr_mat = Mat::default();
    imgproc::cvt_color(
        &rgb_mat,
        &mut bgr_mat,
        imgproc::COLOR_RGB2BGR,
        0,
        opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(|e| AnnotatorError::encode(format!("Failed to convert RGB to BGR: {}", e)))?;
    Ok(bgr_mat)
}

/// Decodes files with `VideoCapture`
#[derive(Debug, Clone, Default)]
pub struct OpenCvFrameSource;

impl OpenCvFrameSource {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for OpenCvFrameSource {
    fn open(&self, path: &Path, on_frame: &mut dyn FnMut(usize)) -> Result<DecodedVideo> {
        if !path.is_file() {
            return Err(AnnotatorError::invalid_source(format!(
                "No such file: {}",
                path.display()
            )));
        }
        let path_str = path_str(path)?;
        log::info!("Opening video source: {}", path_str);

        let mut capture = VideoCapture::from_file(path_str, CAP_ANY).map_err(|e| {
            AnnotatorError::invalid_source(format!("Failed to open video source: {}", e))
        })?;
        if !capture.is_opened().unwrap_or(false) {
            return Err(AnnotatorError::invalid_source(format!(
                "Failed to open video capture: {}",
                path_str
            )));
        }

        let mut fps = capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        if fps <= 0.0 || !fps.is_finite() {
            log::warn!(
                "Video source returned invalid FPS ({}), defaulting to {:.1}",
                fps,
                FALLBACK_FPS
            );
            fps = FALLBACK_FPS;
        }

        let start = Instant::now();
        let mut mat = Mat::default();
        let mut frames = Vec::new();

        loop {
            let read_success = capture
                .read(&mut mat)
                .map_err(|e| AnnotatorError::invalid_source(format!("Failed to read frame: {}", e)))?;
            if !read_success || mat.empty() {
                break;
            }

            let image = mat_to_rgb_image(&mat)?;
            frames.push(Frame::new(frames.len(), image));
            on_frame(frames.len());

            if frames.len() % 100 == 0 {
                log::debug!("Decoded {} frames", frames.len());
            }
        }

        if frames.is_empty() {
            return Err(AnnotatorError::invalid_source(format!(
                "No frames decoded from {}",
                path_str
            )));
        }

        log::info!(
            "Decoded {} frames @ {:.2} FPS in {:.2}s",
            frames.len(),
            fps,
            start.elapsed().as_secs_f64()
        );
        Ok(DecodedVideo {
            frames,
            frame_rate: fps,
        })
    }
}

/// Writes mp4v-encoded video with `VideoWriter`
#[derive(Debug, Clone, Default)]
pub struct OpenCvVideoEncoder;

impl OpenCvVideoEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl VideoEncoder for OpenCvVideoEncoder {
    fn create(&self, path: &Path, frame_rate: f64, size: (u32, u32)) -> Result<Box<dyn VideoSink>> {
        let path_str = path
            .to_str()
            .ok_or_else(|| AnnotatorError::write(format!("Invalid path: {}", path.display())))?;

        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')
            .map_err(|e| AnnotatorError::encode(format!("Invalid fourcc: {}", e)))?;
        let writer = VideoWriter::new(
            path_str,
            fourcc,
            frame_rate,
            Size::new(size.0 as i32, size.1 as i32),
            true,
        )
        .map_err(|e| AnnotatorError::write(format!("Failed to create video writer: {}", e)))?;

        if !writer.is_opened().unwrap_or(false) {
            return Err(AnnotatorError::write(format!(
                "Failed to open video writer: {}",
                path_str
            )));
        }

        log::info!(
            "Writing video to {} ({}x{} @ {:.2} FPS)",
            path_str,
            size.0,
            size.1,
            frame_rate
        );
        Ok(Box::new(OpenCvVideoSink { writer }))
    }
}

struct OpenCvVideoSink {
    writer: VideoWriter,
}

impl VideoSink for OpenCvVideoSink {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        let mat = rgb_image_to_mat(frame)?;
        self.writer
            .write(&mat)
            .map_err(|e| AnnotatorError::encode(format!("Failed to write frame: {}", e)))
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer
            .release()
            .map_err(|e| AnnotatorError::write(format!("Failed to finalize video: {}", e)))
    }
}
