use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::detect::backend::{DetectorBackend, PrimaryInput};
use crate::detect::result::RawDetections;

enum Script {
    Detections(RawDetections),
    Failure(String),
}

/// Scripted backend for testing and demos.
///
/// Returns a fixed set of raw detections (filtered by the requested threshold)
/// or fails with a fixed reason on every call.
pub struct StubBackend {
    name: &'static str,
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl StubBackend {
    pub fn new(detections: RawDetections) -> Self {
        Self::named("stub", detections)
    }

    pub fn named(name: &'static str, detections: RawDetections) -> Self {
        Self {
            name,
            script: Script::Detections(detections),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Backend that always fails, like a detector whose runtime is missing.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            name: "stub",
            script: Script::Failure(reason.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared invocation counter, readable after the backend is registered.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(RawDetections::default())
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn detect(&mut self, _input: &PrimaryInput<'_>, threshold: f32) -> Result<RawDetections> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Failure(reason) => Err(anyhow!("{}", reason)),
            Script::Detections(raw) => Ok(RawDetections {
                detections: raw
                    .detections
                    .iter()
                    .filter(|det| det.confidence >= threshold)
                    .cloned()
                    .collect(),
                names: raw.names.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::{RawBox, RawDetection};
    use std::path::Path;

    fn raw(confidence: f32) -> RawDetection {
        RawDetection {
            bbox: RawBox::Relative {
                x1: 0.1,
                y1: 0.1,
                x2: 0.2,
                y2: 0.2,
            },
            confidence,
            class_id: Some(39),
            class_name: None,
        }
    }

    #[test]
    fn stub_applies_threshold_and_counts_calls() {
        let mut backend = StubBackend::new(RawDetections::new(vec![raw(0.9), raw(0.1)]));
        let counter = backend.call_counter();
        let image = image::RgbImage::new(8, 8);
        let input = PrimaryInput::new(Path::new("frame.png"), &image);

        let out = backend.detect(&input, 0.25).unwrap();
        assert_eq!(out.detections.len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_stub_reports_reason() {
        let mut backend = StubBackend::failing("model runtime missing");
        let image = image::RgbImage::new(8, 8);
        let input = PrimaryInput::new(Path::new("frame.png"), &image);
        let err = backend.detect(&input, 0.25).unwrap_err();
        assert_eq!(err.to_string(), "model runtime missing");
    }
}
