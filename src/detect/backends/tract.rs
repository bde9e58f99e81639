#![cfg(feature = "backend-tract")]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::{resize, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectorBackend, PrimaryInput};
use crate::detect::result::{RawBox, RawDetection, RawDetections};

const COCO_NAMES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// Expects a single `[1, 4 + classes, anchors]` output with center/size boxes in
/// input pixels followed by per-class scores. Frames are resized to the square
/// model input without letterboxing, so decoded boxes map back as relative
/// coordinates.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    model_path: PathBuf,
    input_size: u32,
    iou_threshold: f32,
    names: HashMap<i64, String>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        let names = COCO_NAMES
            .iter()
            .enumerate()
            .map(|(id, name)| (id as i64, name.to_string()))
            .collect();

        Ok(Self {
            model,
            model_path: model_path.to_path_buf(),
            input_size,
            iou_threshold: 0.45,
            names,
        })
    }

    /// Override the default NMS IoU threshold.
    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
        self.iou_threshold = iou_threshold;
        self
    }

    fn build_input(&self, input: &PrimaryInput<'_>) -> Result<Tensor> {
        if input.width() == 0 || input.height() == 0 {
            return Err(anyhow!("cannot run inference on an empty frame"));
        }
        let resized = resize(
            input.image,
            self.input_size,
            self.input_size,
            FilterType::Triangle,
        );
        let size = self.input_size as usize;
        let tensor = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Ok(tensor.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, threshold: f32) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[1] <= 4 {
            return Err(anyhow!("unexpected output shape {:?}", shape));
        }
        let (rows, anchors) = (shape[1], shape[2]);
        let data: Vec<f32> = view.iter().copied().collect();
        let at = |row: usize, anchor: usize| data[row * anchors + anchor];
        let scale = self.input_size as f32;

        let mut candidates = Vec::new();
        for anchor in 0..anchors {
            let (class, score) = (4..rows)
                .map(|row| (row - 4, at(row, anchor)))
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if !score.is_finite() || score < threshold {
                continue;
            }
            let (cx, cy, w, h) = (
                at(0, anchor),
                at(1, anchor),
                at(2, anchor),
                at(3, anchor),
            );
            candidates.push(RawDetection {
                bbox: RawBox::Relative {
                    x1: (cx - w / 2.0) / scale,
                    y1: (cy - h / 2.0) / scale,
                    x2: (cx + w / 2.0) / scale,
                    y2: (cy + h / 2.0) / scale,
                },
                confidence: score,
                class_id: Some(class as i64),
                class_name: None,
            });
        }
        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "yolo-tract"
    }

    fn model_name(&self) -> Option<String> {
        self.model_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    fn detect(&mut self, input: &PrimaryInput<'_>, threshold: f32) -> Result<RawDetections> {
        let tensor = self.build_input(input)?;
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .context("ONNX inference failed")?;
        let detections = self.decode(outputs, threshold)?;
        Ok(RawDetections::new(detections).with_names(self.names.clone()))
    }
}

fn corners(bbox: &RawBox) -> (f32, f32, f32, f32) {
    match *bbox {
        RawBox::Pixels { x1, y1, x2, y2 } | RawBox::Relative { x1, y1, x2, y2 } => {
            (x1, y1, x2, y2)
        }
    }
}

fn iou(a: &RawBox, b: &RawBox) -> f32 {
    let (ax1, ay1, ax2, ay2) = corners(a);
    let (bx1, by1, bx2, by2) = corners(b);
    let iw = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
    let ih = (ay2.min(by2) - ay1.max(by1)).max(0.0);
    let inter = iw * ih;
    let union = (ax2 - ax1) * (ay2 - ay1) + (bx2 - bx1) * (by2 - by1) - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Per-class greedy NMS. Survivors keep descending-score order.
fn non_max_suppression(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
