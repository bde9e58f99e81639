use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use station_scan::detect::StubBackend;
use station_scan::{
    annotate, BackendRegistry, DetectionResult, HeuristicConfig, HeuristicDetector, Origin,
    RawBox, RawDetection, RawDetections, ResolutionPipeline, Stage, TargetCategory,
};

fn write_png(dir: &TempDir, name: &str, image: &RgbImage) -> PathBuf {
    let path = dir.path().join(name);
    image.save(&path).expect("write png");
    path
}

fn blank() -> RgbImage {
    RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]))
}

fn pipeline(backend: Option<StubBackend>) -> ResolutionPipeline {
    let mut registry = BackendRegistry::new();
    if let Some(backend) = backend {
        registry.register(backend);
    }
    ResolutionPipeline::new(registry, HeuristicDetector::default())
}

fn raw(class_id: Option<i64>, class_name: &str, confidence: f32) -> RawDetection {
    RawDetection {
        bbox: RawBox::Pixels {
            x1: 40.0,
            y1: 30.0,
            x2: 120.0,
            y2: 90.0,
        },
        confidence,
        class_id,
        class_name: Some(class_name.to_string()),
    }
}

fn assert_envelope_invariants(result: &DetectionResult) {
    assert_eq!(result.count, result.detections.len());
    if result.success {
        assert!(result.count >= 1);
    }
    for det in &result.detections {
        assert!((0.0..=1.0).contains(&det.confidence));
        assert!(det.x >= 0.0 && det.y >= 0.0);
        assert!(det.x + det.width <= 1.0 + 1e-6);
        assert!(det.y + det.height <= 1.0 + 1e-6);
        assert_eq!(det.color, annotate(det.label).color);
        assert_eq!(det.context, annotate(det.label).context);
    }
}

#[test]
fn primary_suitcase_resolves_to_toolbox() {
    let dir = TempDir::new().unwrap();
    let path = write_png(&dir, "bay.png", &blank());
    let stub = StubBackend::named(
        "primary-model",
        RawDetections::new(vec![raw(Some(28), "suitcase", 0.81)]),
    );

    let result = pipeline(Some(stub)).detect(&path);

    assert!(result.success);
    assert_eq!(result.method, "primary-model");
    assert_eq!(result.count, 1);
    let det = &result.detections[0];
    assert_eq!(det.label, TargetCategory::Toolbox);
    assert_eq!(det.color, "#ffc107");
    assert_eq!(det.origin, Origin::PrimaryModel);
    assert_eq!(det.original_label.as_deref(), Some("suitcase"));
    assert!((det.confidence - 0.81).abs() < 1e-6);
    assert_envelope_invariants(&result);
}

#[test]
fn failing_primary_falls_back_to_color_heuristic() {
    let dir = TempDir::new().unwrap();
    let mut image = blank();
    for y in 50..110 {
        for x in 50..60 {
            image.put_pixel(x, y, Rgb([230, 20, 20]));
        }
    }
    let path = write_png(&dir, "corridor.png", &image);
    let failing = StubBackend::failing("detector runtime not installed");
    let calls = failing.call_counter();

    let pipeline = pipeline(Some(failing));
    let resolution = pipeline.resolve(&path, 0.25);
    let result = &resolution.result;

    assert!(result.success);
    assert_eq!(result.method, "heuristic");
    assert_eq!(result.count, 1);
    let det = &result.detections[0];
    assert_eq!(det.label, TargetCategory::FireExtinguisher);
    assert_eq!(det.origin, Origin::Heuristic);
    assert!((det.confidence - 0.56).abs() < 1e-4);
    assert!((det.x - 0.25).abs() < 1e-6);
    assert!((det.height - 0.3).abs() < 1e-6);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        resolution.stages,
        vec![
            Stage::Init,
            Stage::PrimaryDetect,
            Stage::HeuristicDetect,
            Stage::Success,
        ]
    );
    assert_envelope_invariants(result);
}

#[test]
fn empty_primary_and_blank_image_use_synthetic_fallback() {
    let dir = TempDir::new().unwrap();
    let path = write_png(&dir, "empty.png", &blank());

    let result = pipeline(Some(StubBackend::default())).detect(&path);

    assert!(result.success);
    assert_eq!(result.method, "fallback");
    assert_eq!(result.count, 3);
    let labels: Vec<_> = result.detections.iter().map(|d| d.label).collect();
    assert_eq!(labels, TargetCategory::ALL.to_vec());
    assert!(result
        .detections
        .iter()
        .all(|d| d.origin == Origin::Synthetic && d.forced));
    assert_envelope_invariants(&result);
}

#[test]
fn bottle_with_unknown_id_maps_through_synonym() {
    let dir = TempDir::new().unwrap();
    let path = write_png(&dir, "galley.png", &blank());
    let stub = StubBackend::named(
        "primary-model",
        RawDetections::new(vec![raw(Some(900), "bottle", 0.6)]),
    );

    let result = pipeline(Some(stub)).detect(&path);

    assert_eq!(result.method, "primary-model");
    assert_eq!(result.count, 1);
    assert_eq!(result.detections[0].label, TargetCategory::FireExtinguisher);
    assert_envelope_invariants(&result);
}

#[test]
fn broken_heuristic_stage_still_resolves_through_fallback() {
    let dir = TempDir::new().unwrap();
    let path = write_png(&dir, "hatch.png", &blank());
    let heuristic = HeuristicDetector::new(HeuristicConfig {
        blur_sigma: 0.0,
        ..HeuristicConfig::default()
    });
    let pipeline = ResolutionPipeline::new(BackendRegistry::new(), heuristic);

    let resolution = pipeline.resolve(&path, 0.25);

    assert_eq!(
        resolution.stages,
        vec![
            Stage::Init,
            Stage::HeuristicDetect,
            Stage::SyntheticFallback,
            Stage::Success,
        ]
    );
    let result = &resolution.result;
    assert!(result.success);
    assert_eq!(result.method, "fallback");
    assert_eq!(result.count, 3);
    assert_envelope_invariants(result);
}

#[test]
fn missing_image_is_the_only_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.png");
    let stub = StubBackend::named("primary-model", RawDetections::default());
    let calls = stub.call_counter();

    let result = pipeline(Some(stub)).detect(&path);

    assert!(!result.success);
    assert_eq!(result.count, 0);
    assert!(result.detections.is_empty());
    assert!(result.error.as_deref().unwrap_or("").contains("missing.png"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["method"], "none");
}

#[test]
fn low_confidence_primary_hits_are_filtered_out() {
    let dir = TempDir::new().unwrap();
    let path = write_png(&dir, "dim.png", &blank());
    let stub = StubBackend::named(
        "primary-model",
        RawDetections::new(vec![raw(Some(28), "suitcase", 0.81), raw(Some(39), "bottle", 0.3)]),
    );

    let result = pipeline(Some(stub)).detect_with_threshold(&path, 0.5);

    assert_eq!(result.count, 1);
    assert!(result.detections.iter().all(|d| d.confidence >= 0.5));
}

#[test]
fn synthetic_fallback_is_repeatable() {
    let dir = TempDir::new().unwrap();
    let first = write_png(&dir, "a.png", &blank());
    let second = write_png(&dir, "b.png", &blank());
    let pipeline = pipeline(None);

    let key = |result: &DetectionResult| {
        result
            .detections
            .iter()
            .map(|d| (d.label, d.confidence, d.x, d.y, d.width, d.height))
            .collect::<Vec<_>>()
    };
    let a = pipeline.detect(&first);
    let b = pipeline.detect(&second);
    assert_eq!(a.method, "fallback");
    assert_eq!(key(&a), key(&b));
    assert_ne!(a.detections[0].id, b.detections[0].id);
}

#[test]
fn envelope_serializes_with_wire_names() {
    let dir = TempDir::new().unwrap();
    let path = write_png(&dir, "wire.png", &blank());
    let stub = StubBackend::named(
        "primary-model",
        RawDetections::new(vec![raw(Some(28), "suitcase", 0.81)]),
    );

    let result = pipeline(Some(stub)).detect(Path::new(&path));
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 1);
    assert!(json["timestamp"].as_str().unwrap().contains('T'));
    let det = &json["detections"][0];
    assert_eq!(det["label"], "toolbox");
    assert_eq!(det["origin"], "primary-model");
    assert_eq!(det["originalClass"], "suitcase");
    assert!(det.get("forced").is_none());
}
