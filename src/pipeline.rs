//! Resolution pipeline.
//!
//! Each image walks a fixed chain of stages and stops at the first one that
//! yields detections:
//!
//! ```text
//! Init -> PrimaryDetect -> Remap -> HeuristicDetect -> SyntheticFallback -> Success
//!   \-> ImageError
//! ```
//!
//! A stage that errors, panics, or finds nothing hands over to the next one.
//! Only an unreadable image produces a failed result; everything else resolves
//! to a successful envelope tagged with the stage that produced it.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

use image::RgbImage;
use log::{debug, info, warn};

use crate::config::{BackendKind, ScanConfig};
use crate::detect::{
    BackendRegistry, BoundingBox, Detection, DetectionResult, Origin, PrimaryInput, RawDetections,
    StubBackend, SubprocessBackend, SubprocessConfig,
};
use crate::heuristic::{Candidate, HeuristicDetector};
use crate::ingest::{FileImageSource, ImageSource};
use crate::mapping::CategoryMapping;
use crate::synthetic::synthetic_detections;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const METHOD_HEURISTIC: &str = "heuristic";
pub const METHOD_FALLBACK: &str = "fallback";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Init,
    PrimaryDetect,
    Remap,
    HeuristicDetect,
    SyntheticFallback,
    Success,
    ImageError,
}

/// What a stage handed back to the pipeline.
#[derive(Debug)]
pub enum StageOutcome<T> {
    Found(T),
    Empty,
    Failed(String),
}

/// A resolved image plus the stages it passed through, in order.
#[derive(Debug)]
pub struct Resolution {
    pub result: DetectionResult,
    pub stages: Vec<Stage>,
}

pub struct ResolutionPipeline {
    registry: BackendRegistry,
    mapping: &'static CategoryMapping,
    heuristic: HeuristicDetector,
    source: Box<dyn ImageSource>,
    confidence_threshold: f32,
}

impl ResolutionPipeline {
    pub fn new(registry: BackendRegistry, heuristic: HeuristicDetector) -> Self {
        Self {
            registry,
            mapping: CategoryMapping::shared(),
            heuristic,
            source: Box::new(FileImageSource::new()),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// Builds the pipeline described by `config`.
    ///
    /// A primary backend that cannot be constructed is logged and left out; the
    /// pipeline then resolves through the heuristic and synthetic stages.
    pub fn from_config(config: &ScanConfig) -> Self {
        let registry = build_registry(config);
        Self::new(registry, HeuristicDetector::new(config.heuristic.clone()))
            .with_threshold(config.confidence_threshold)
    }

    pub fn with_source<S: ImageSource + 'static>(mut self, source: S) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = sanitize_threshold(threshold);
        self
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Detect target objects in the image at `path` using the configured threshold.
    pub fn detect(&self, path: impl AsRef<Path>) -> DetectionResult {
        self.resolve(path.as_ref(), self.confidence_threshold).result
    }

    pub fn detect_with_threshold(&self, path: impl AsRef<Path>, threshold: f32) -> DetectionResult {
        self.resolve(path.as_ref(), threshold).result
    }

    /// Runs the full stage chain and reports which stages were visited.
    pub fn resolve(&self, path: &Path, threshold: f32) -> Resolution {
        let threshold = sanitize_threshold(threshold);
        let started = Instant::now();
        let mut stages = vec![Stage::Init];

        let image = match self.source.load(path) {
            Ok(image) => image,
            Err(err) => {
                warn!("pipeline: {}", err);
                stages.push(Stage::ImageError);
                return Resolution {
                    result: DetectionResult::failure(err.to_string()),
                    stages,
                };
            }
        };
        debug!(
            "pipeline: loaded {} ({}x{}), threshold {:.2}",
            path.display(),
            image.width(),
            image.height(),
            threshold
        );

        let result = self.run_stages(path, &image, threshold, &mut stages);
        stages.push(Stage::Success);
        info!(
            "pipeline: {} resolved by {} with {} detection(s) in {:?}",
            path.display(),
            result.method,
            result.count,
            started.elapsed()
        );
        Resolution { result, stages }
    }

    fn run_stages(
        &self,
        path: &Path,
        image: &RgbImage,
        threshold: f32,
        stages: &mut Vec<Stage>,
    ) -> DetectionResult {
        if let Some(method) = self.registry.default_name().map(str::to_string) {
            stages.push(Stage::PrimaryDetect);
            let input = PrimaryInput::new(path, image);
            match self.primary_stage(&input, threshold) {
                StageOutcome::Found(raw) => {
                    stages.push(Stage::Remap);
                    let detections = self.remap_stage(&raw, image, threshold);
                    if !detections.is_empty() {
                        return DetectionResult::success(method, detections)
                            .with_model(self.registry.default_model_name());
                    }
                    debug!("pipeline: no primary detection mapped to a target category");
                }
                StageOutcome::Empty => debug!("pipeline: {} found nothing", method),
                StageOutcome::Failed(reason) => {
                    warn!("pipeline: primary detector {} failed: {}", method, reason)
                }
            }
        } else {
            debug!("pipeline: no primary detector configured");
        }

        stages.push(Stage::HeuristicDetect);
        match self.heuristic_stage(image, threshold) {
            StageOutcome::Found(detections) => {
                return DetectionResult::success(METHOD_HEURISTIC, detections);
            }
            StageOutcome::Empty => debug!("pipeline: heuristic found nothing"),
            StageOutcome::Failed(reason) => warn!("pipeline: heuristic failed: {}", reason),
        }

        stages.push(Stage::SyntheticFallback);
        DetectionResult::success(METHOD_FALLBACK, synthetic_detections())
    }

    fn primary_stage(&self, input: &PrimaryInput<'_>, threshold: f32) -> StageOutcome<RawDetections> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.registry.detect_with_default(input, threshold)
        }));
        match outcome {
            Ok(Ok(raw)) if raw.is_empty() => StageOutcome::Empty,
            Ok(Ok(raw)) => {
                debug!("pipeline: primary returned {} raw detection(s)", raw.detections.len());
                StageOutcome::Found(raw)
            }
            Ok(Err(err)) => StageOutcome::Failed(format!("{:#}", err)),
            Err(_) => StageOutcome::Failed("primary detector panicked".to_string()),
        }
    }

    /// Maps raw classes onto target categories. Unmapped classes are dropped.
    fn remap_stage(
        &self,
        raw: &RawDetections,
        image: &RgbImage,
        threshold: f32,
    ) -> Vec<Detection> {
        raw
            .detections
            .iter()
            .filter_map(|det| {
                let label = raw.class_label(det);
                let Some(category) = self.mapping.map(&label, det.class_id).category() else {
                    debug!("pipeline: dropping unmapped class '{}'", label);
                    return None;
                };
                if !det.confidence.is_finite() || det.confidence < threshold {
                    return None;
                }
                let bbox = BoundingBox::from_raw(&det.bbox, image.width(), image.height())?;
                Some(Detection::new(
                    category,
                    det.confidence,
                    bbox,
                    Origin::PrimaryModel,
                    Some(label),
                ))
            })
            .collect()
    }

    fn heuristic_stage(&self, image: &RgbImage, threshold: f32) -> StageOutcome<Vec<Detection>> {
        match self.heuristic.detect(image, threshold) {
            Ok(candidates) if candidates.is_empty() => StageOutcome::Empty,
            Ok(candidates) => StageOutcome::Found(
                candidates.into_iter().map(heuristic_detection).collect(),
            ),
            Err(err) => StageOutcome::Failed(format!("{:#}", err)),
        }
    }
}

fn heuristic_detection(candidate: Candidate) -> Detection {
    Detection::new(
        candidate.category,
        candidate.confidence,
        candidate.bbox,
        Origin::Heuristic,
        Some(candidate.pass.label().to_string()),
    )
}

fn sanitize_threshold(threshold: f32) -> f32 {
    if threshold.is_finite() {
        threshold.clamp(0.0, 1.0)
    } else {
        DEFAULT_CONFIDENCE_THRESHOLD
    }
}

fn build_registry(config: &ScanConfig) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    let primary = &config.primary;
    match primary.backend {
        BackendKind::None => {}
        BackendKind::Stub => registry.register(StubBackend::default()),
        BackendKind::Subprocess => {
            let model_path = Some(primary.model_path.clone());
            registry.register(SubprocessBackend::new(SubprocessConfig {
                program: primary.command.clone(),
                args: primary.args.clone(),
                model_path,
                timeout: primary.timeout,
            }));
        }
        BackendKind::Tract => register_tract(&mut registry, config),
    }
    if let Some(name) = registry.default_name() {
        info!("pipeline: primary detector {}", name);
    } else {
        info!("pipeline: running without a primary detector");
    }
    registry
}

#[cfg(feature = "backend-tract")]
fn register_tract(registry: &mut BackendRegistry, config: &ScanConfig) {
    let primary = &config.primary;
    match crate::detect::TractBackend::new(&primary.model_path, primary.input_size) {
        Ok(backend) => registry.register(backend.with_iou_threshold(primary.iou_threshold)),
        Err(err) => warn!(
            "pipeline: primary detector unavailable ({}): {:#}",
            primary.model_path.display(),
            err
        ),
    }
}

#[cfg(not(feature = "backend-tract"))]
fn register_tract(_registry: &mut BackendRegistry, config: &ScanConfig) {
    warn!(
        "pipeline: tract backend requested for {} but this build lacks the backend-tract feature",
        config.primary.model_path.display()
    );
}
