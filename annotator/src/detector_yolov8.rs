//! YOLOv8 detector using ONNX Runtime
//!
//! CPU session with full graph optimisation. Boxes are returned in the
//! pixel coordinates of the frame that was passed in, before any class or
//! confidence policy is applied (that is the adapter's job), except for a
//! low floor that keeps the NMS input small.

use crate::detector_trait::Detector;
use crate::error::AnnotatorError;
use crate::types::{DetectorConfig, RawDetection};
use image::imageops::FilterType;
use image::RgbImage;
use log::{debug, info};
use ndarray::{Array, ArrayView, IxDyn};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};

/// Scores below this never reach NMS
const CANDIDATE_FLOOR: f32 = 0.05;

pub struct YoloV8Detector {
    name: String,
    session: Session,
    config: DetectorConfig,
}

impl YoloV8Detector {
    pub fn new(name: &str, config: DetectorConfig) -> Result<Self, AnnotatorError> {
        info!("Loading YOLOv8 model '{}' from {}", name, config.model_path);

        let mut builder = Session::builder()
            .map_err(|e| AnnotatorError::config(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| AnnotatorError::config(e.to_string()))?;

        if let Some(threads) = config.num_threads {
            builder = builder
                .with_intra_threads(threads)
                .map_err(|e| AnnotatorError::config(e.to_string()))?;
        }

        let session = builder.commit_from_file(&config.model_path).map_err(|e| {
            AnnotatorError::config(format!(
                "Failed to load model {}: {}",
                config.model_path, e
            ))
        })?;

        Ok(Self {
            name: name.to_string(),
            session,
            config,
        })
    }

    /// Resize to the model input, normalise to [0, 1], CHW layout [1, 3, H, W]
    fn preprocess(&self, image: &RgbImage) -> Array<f32, IxDyn> {
        let (in_w, in_h) = self.config.input_size;
        let resized = image::imageops::resize(image, in_w, in_h, FilterType::Triangle);

        let mut input = Array::zeros((1, 3, in_h as usize, in_w as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }

        input.into_dyn()
    }

    /// Decode a [1, 4 + classes, boxes] YOLOv8 head into source-pixel boxes
    fn postprocess(
        &self,
        output: ArrayView<f32, IxDyn>,
        orig_w: u32,
        orig_h: u32,
    ) -> Result<Vec<RawDetection>, String> {
        let shape = output.shape();
        if shape.len() != 3 || shape[1] < 5 {
            return Err(format!("Unexpected output shape: {:?}", shape));
        }

        let num_channels = shape[1];
        let num_boxes = shape[2];
        let (in_w, in_h) = self.config.input_size;
        let scale_x = orig_w as f32 / in_w as f32;
        let scale_y = orig_h as f32 / in_h as f32;

        let mut candidates = Vec::new();
        for i in 0..num_boxes {
            let (mut confidence, mut class_id) = (0.0f32, 0u32);
            for c in 0..num_channels - 4 {
                let score = output[[0, 4 + c, i]];
                if score > confidence {
                    confidence = score;
                    class_id = c as u32;
                }
            }

            if confidence < CANDIDATE_FLOOR {
                continue;
            }

            let x_center = output[[0, 0, i]] * scale_x;
            let y_center = output[[0, 1, i]] * scale_y;
            let width = output[[0, 2, i]] * scale_x;
            let height = output[[0, 3, i]] * scale_y;

            candidates.push(RawDetection::new(
                class_id,
                confidence,
                (x_center - width / 2.0).clamp(0.0, orig_w as f32),
                (y_center - height / 2.0).clamp(0.0, orig_h as f32),
                (x_center + width / 2.0).clamp(0.0, orig_w as f32),
                (y_center + height / 2.0).clamp(0.0, orig_h as f32),
            ));
        }

        let mut kept = non_max_suppression(candidates, self.config.nms_threshold);
        kept.truncate(self.config.max_detections);
        Ok(kept)
    }
}

impl Detector for YoloV8Detector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<RawDetection>, String> {
        debug!("Running {} on {}x{} frame", self.name, image.width(), image.height());

        let input = self.preprocess(image);
        let tensor = TensorRef::from_array_view(&input).map_err(|e| e.to_string())?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| e.to_string())?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| e.to_string())?
            .into_owned();

        // Release the borrow on the session before postprocessing
        drop(outputs);

        self.postprocess(output.view(), image.width(), image.height())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Per-class greedy NMS, highest confidence first
fn non_max_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in detections {
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == det.class_id && k.iou(&det) >= iou_threshold);
        if !suppressed {
            keep.push(det);
        }
    }
    keep
}
