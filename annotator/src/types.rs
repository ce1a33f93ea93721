//! Type definitions for the frame annotation pipeline

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One decoded raster image from the source video
///
/// The pixel buffer is shared behind an `Arc` so the session, the exporters
/// and the render sink can hold the same frame without copying it.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based position within the source video
    pub index: usize,
    pub image: Arc<RgbImage>,
}

impl Frame {
    pub fn new(index: usize, image: RgbImage) -> Self {
        Self {
            index,
            image: Arc::new(image),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// A frame with its detections baked in as a visual overlay
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub index: usize,
    pub image: Arc<RgbImage>,
}

impl AnnotatedFrame {
    pub fn new(index: usize, image: RgbImage) -> Self {
        Self {
            index,
            image: Arc::new(image),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Box as returned by a detector backend, before any policy is applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl RawDetection {
    pub fn new(class_id: u32, confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            class_id,
            confidence,
            x1,
            y1,
            x2,
            y2,
        }
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).abs() * (self.y2 - self.y1).abs()
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &RawDetection) -> f32 {
        let x_left = self.x1.max(other.x1);
        let y_top = self.y1.max(other.y1);
        let x_right = self.x2.min(other.x2);
        let y_bottom = self.y2.min(other.y2);

        if x_right <= x_left || y_bottom <= y_top {
            return 0.0;
        }

        let intersection = (x_right - x_left) * (y_bottom - y_top);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Single accepted detection, axis-aligned in source-frame pixel coordinates
///
/// Always satisfies `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub frame_index: usize,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl Detection {
    /// Build a detection from two opposite corners in any order.
    ///
    /// Returns `None` for degenerate (zero width or height) or non-finite boxes.
    pub fn from_corners(
        frame_index: usize,
        (ax, ay): (f32, f32),
        (bx, by): (f32, f32),
        confidence: f32,
    ) -> Option<Self> {
        if ![ax, ay, bx, by].iter().all(|v| v.is_finite()) {
            return None;
        }

        let (x1, x2) = (ax.min(bx), ax.max(bx));
        let (y1, y2) = (ay.min(by), ay.max(by));
        if x1 == x2 || y1 == y2 {
            return None;
        }

        Some(Self {
            frame_index,
            x1,
            y1,
            x2,
            y2,
            confidence,
        })
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// Configuration for one detector backend (one model variant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: String,

    /// Model input size (width, height)
    pub input_size: (u32, u32),

    /// Non-maximum suppression IoU threshold (0-1)
    pub nms_threshold: f32,

    /// Maximum number of detections per frame
    pub max_detections: usize,

    /// Number of threads for CPU inference
    pub num_threads: Option<usize>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "models/yolo_v8_model_base.onnx".to_string(),
            input_size: (640, 640),
            nms_threshold: 0.45,
            max_detections: 100,
            num_threads: None,
        }
    }
}
