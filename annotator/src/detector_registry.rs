//! Registry of loaded detector variants
//!
//! Built once at startup and handed to the foreground controller. Each
//! variant's detector is shared behind a mutex; a load+annotate run holds the
//! lock for its whole duration, which pins the variant for that run.

use crate::config::{AppConfig, VariantConfig};
use crate::detector_trait::Detector;
use crate::error::{AnnotatorError, Result};
use std::sync::{Arc, Mutex};

pub type SharedDetector = Arc<Mutex<Box<dyn Detector>>>;

#[derive(Default)]
pub struct DetectorRegistry {
    entries: Vec<(String, SharedDetector)>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry by loading every configured variant with `factory`
    pub fn from_config<F>(config: &AppConfig, mut factory: F) -> Result<Self>
    where
        F: FnMut(&VariantConfig) -> Result<Box<dyn Detector>>,
    {
        let mut registry = Self::new();
        for variant in &config.variants {
            let detector = factory(variant)?;
            log::info!("Loaded detector variant '{}' ({})", variant.name, detector.name());
            registry.register(&variant.name, detector)?;
        }
        Ok(registry)
    }

    /// Load every configured variant as an ONNX YOLOv8 model
    #[cfg(feature = "onnx")]
    pub fn load_yolov8(config: &AppConfig) -> Result<Self> {
        Self::from_config(config, |variant| {
            let detector = crate::detector_yolov8::YoloV8Detector::new(
                &variant.name,
                variant.detector.clone(),
            )?;
            Ok(Box::new(detector) as Box<dyn Detector>)
        })
    }

    /// Register a detector under `name`; names are unique
    pub fn register(&mut self, name: &str, detector: Box<dyn Detector>) -> Result<()> {
        if self.contains(name) {
            return Err(AnnotatorError::config(format!(
                "detector variant '{}' registered twice",
                name
            )));
        }
        self.entries
            .push((name.to_string(), Arc::new(Mutex::new(detector))));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<SharedDetector> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, detector)| Arc::clone(detector))
            .ok_or_else(|| AnnotatorError::config(format!("unknown detector variant '{}'", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(entry, _)| entry == name)
    }

    /// Variant names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
