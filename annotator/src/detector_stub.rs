//! Deterministic detector used for demos, tests and benchmarks

use crate::detector_trait::Detector;
use crate::types::RawDetection;
use image::RgbImage;
use std::collections::HashMap;

/// Returns a fixed script of boxes, one entry per `detect` call.
///
/// Calls past the end of the script return no boxes. Individual calls can be
/// scripted to fail.
pub struct ScriptedDetector {
    name: String,
    script: Vec<Vec<RawDetection>>,
    failures: HashMap<usize, String>,
    calls: usize,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<RawDetection>>) -> Self {
        Self {
            name: "scripted".to_string(),
            script,
            failures: HashMap::new(),
            calls: 0,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Make the `call`-th invocation (zero-based) fail with `reason`
    pub fn fail_on_call(mut self, call: usize, reason: &str) -> Self {
        self.failures.insert(call, reason.to_string());
        self
    }

    /// Number of `detect` calls made so far
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<RawDetection>, String> {
        let call = self.calls;
        self.calls += 1;

        if let Some(reason) = self.failures.get(&call) {
            return Err(reason.clone());
        }

        Ok(self.script.get(call).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
