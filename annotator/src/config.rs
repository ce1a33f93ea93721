//! Application configuration
//!
//! Loaded once at startup from a JSON file (or taken from `Default`) and shared
//! read-only by the foreground controller and every job.

use crate::error::{AnnotatorError, Result};
use crate::types::DetectorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Detection policy applied to every detector variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionPolicy {
    /// The single class of interest kept from the detector output
    pub target_class: u32,
    /// Detections below this confidence are discarded (inclusive bound)
    pub confidence_threshold: f32,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            target_class: 0,
            confidence_threshold: 0.25,
        }
    }
}

/// How detections are drawn onto annotated frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub color: [u8; 3],
    pub thickness: i32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: [255, 0, 0],
            thickness: 3,
        }
    }
}

/// A named, selectable detector variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub name: String,
    #[serde(default)]
    pub detector: DetectorConfig,
}

impl VariantConfig {
    pub fn new(name: &str, model_path: &str) -> Self {
        Self {
            name: name.to_string(),
            detector: DetectorConfig {
                model_path: model_path.to_string(),
                ..DetectorConfig::default()
            },
        }
    }
}

/// Tabular report file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Xlsx,
    Csv,
}

impl ReportFormat {
    /// Canonical file extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }
}

impl Default for ReportFormat {
    fn default() -> Self {
        Self::Xlsx
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Size of the raster handed to the render sink (width, height)
    pub display_size: (u32, u32),
    pub detection: DetectionPolicy,
    pub overlay: OverlayStyle,
    pub variants: Vec<VariantConfig>,
    pub default_variant: String,
    pub report_format: ReportFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            display_size: (720, 480),
            detection: DetectionPolicy::default(),
            overlay: OverlayStyle::default(),
            variants: vec![
                VariantConfig::new("YOLO Base", "models/yolo_v8_model_base.onnx"),
                VariantConfig::new("YOLO Multi-Class", "models/yolo_v8_2class_model.onnx"),
                VariantConfig::new("YOLO Resilient", "models/yolo_v8_resilient_2class.onnx"),
            ],
            default_variant: "YOLO Base".to_string(),
            report_format: ReportFormat::Xlsx,
        }
    }
}

impl AppConfig {
    /// Load and validate a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        log::info!(
            "Loaded configuration from {} ({} detector variants)",
            path.display(),
            config.variants.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let (width, height) = self.display_size;
        if width == 0 || height == 0 {
            return Err(AnnotatorError::config(format!(
                "display size must be non-zero, got {}x{}",
                width, height
            )));
        }

        let threshold = self.detection.confidence_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(AnnotatorError::config(format!(
                "confidence threshold must be in (0, 1], got {}",
                threshold
            )));
        }

        if self.overlay.thickness < 1 {
            return Err(AnnotatorError::config("overlay thickness must be at least 1"));
        }

        if self.variant(&self.default_variant).is_none() {
            return Err(AnnotatorError::config(format!(
                "default variant '{}' is not configured",
                self.default_variant
            )));
        }

        Ok(())
    }

    pub fn variant(&self, name: &str) -> Option<&VariantConfig> {
        self.variants.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.display_size, (720, 480));
        assert_eq!(config.detection.confidence_threshold, 0.25);
        assert_eq!(config.variants.len(), 3);
        assert_eq!(config.default_variant, "YOLO Base");
        assert_eq!(config.report_format.extension(), "xlsx");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "detection": {{ "confidence_threshold": 0.4 }},
                "variants": [{{ "name": "Tiny", "detector": {{ "model_path": "tiny.onnx" }} }}],
                "default_variant": "Tiny",
                "report_format": "csv"
            }}"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.detection.confidence_threshold, 0.4);
        assert_eq!(config.detection.target_class, 0);
        assert_eq!(config.display_size, (720, 480));
        assert_eq!(config.report_format, ReportFormat::Csv);

        let tiny = config.variant("Tiny").unwrap();
        assert_eq!(tiny.detector.model_path, "tiny.onnx");
        assert_eq!(tiny.detector.input_size, (640, 640));
    }

    #[test]
    fn test_unknown_default_variant_rejected() {
        let config = AppConfig {
            default_variant: "Missing".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(AnnotatorError::Config(_))));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = AppConfig::default();
        config.detection.confidence_threshold = 0.0;
        assert!(config.validate().is_err());
    }
}
