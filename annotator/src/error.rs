//! Error types for the frame annotation pipeline

use thiserror::Error;

/// Result type alias for the annotator library
pub type Result<T> = std::result::Result<T, AnnotatorError>;

/// Errors that can occur while loading, annotating or exporting a session
#[derive(Error, Debug)]
pub enum AnnotatorError {
    #[error("Invalid video source: {0}")]
    InvalidSource(String),

    #[error("Detection failed on frame {frame}: {reason}")]
    Detection { frame: usize, reason: String },

    #[error("No annotated frames to export")]
    NoFrames,

    #[error("No detections to export")]
    NoDetections,

    #[error("Video encoding failed: {0}")]
    Encode(String),

    #[error("Report write failed: {0}")]
    Write(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl AnnotatorError {
    pub fn invalid_source<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSource(msg.into())
    }

    pub fn detection<S: Into<String>>(frame: usize, reason: S) -> Self {
        Self::Detection {
            frame,
            reason: reason.into(),
        }
    }

    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    pub fn write<S: Into<String>>(msg: S) -> Self {
        Self::Write(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}
