//! Helpers shared by the video and report exporters

use crate::error::{AnnotatorError, Result};
use std::path::{Path, PathBuf};

/// Append `.{extension}` to `path` unless it already ends with it.
///
/// Any other extension is kept: `clip.avi` becomes `clip.avi.mp4`.
pub fn normalize_extension(path: &Path, extension: &str) -> PathBuf {
    let suffix = format!(".{}", extension);
    let name = path.to_string_lossy();
    if name.ends_with(&suffix) {
        path.to_path_buf()
    } else {
        PathBuf::from(format!("{}{}", name, suffix))
    }
}

/// Create the parent directory of an output file if needed
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent).map_err(|e| {
                AnnotatorError::write(format!(
                    "Failed to create output directory {}: {}",
                    parent.display(),
                    e
                ))
            })
        }
        _ => Ok(()),
    }
}
