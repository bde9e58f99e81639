use std::collections::HashMap;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::annotate::annotate;
use crate::category::TargetCategory;

// ----------------------------------------------------------------------------
// Raw detector output
// ----------------------------------------------------------------------------

/// Box as reported by a primary detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RawBox {
    /// Corner coordinates in source-image pixels.
    Pixels { x1: f32, y1: f32, x2: f32, y2: f32 },
    /// Corner coordinates relative to the image (0..1).
    Relative { x1: f32, y1: f32, x2: f32, y2: f32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub bbox: RawBox,
    pub confidence: f32,
    pub class_id: Option<i64>,
    pub class_name: Option<String>,
}

/// Everything a primary detector returns for one image.
#[derive(Clone, Debug, Default)]
pub struct RawDetections {
    pub detections: Vec<RawDetection>,
    /// Class id → name lookup for the model's vocabulary.
    pub names: HashMap<i64, String>,
}

impl RawDetections {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            detections,
            names: HashMap::new(),
        }
    }

    pub fn with_names(mut self, names: HashMap<i64, String>) -> Self {
        self.names = names;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Resolves the class name for a raw detection.
    pub fn class_label(&self, detection: &RawDetection) -> String {
        if let Some(name) = &detection.class_name {
            return name.clone();
        }
        match detection.class_id {
            Some(id) => self
                .names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| format!("unknown_{}", id)),
            None => String::new(),
        }
    }
}

// ----------------------------------------------------------------------------
// Normalized boxes
// ----------------------------------------------------------------------------

/// Box in normalized image coordinates, always inside the unit square.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Clamps corner coordinates into the unit square.
    ///
    /// Returns `None` for non-finite input or when nothing of the box is left.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Option<Self> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return None;
        }
        let left = x1.min(x2).clamp(0.0, 1.0);
        let right = x1.max(x2).clamp(0.0, 1.0);
        let top = y1.min(y2).clamp(0.0, 1.0);
        let bottom = y1.max(y2).clamp(0.0, 1.0);
        let width = right - left;
        let height = bottom - top;
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(Self {
            x: left,
            y: top,
            width: width.min(1.0 - left),
            height: height.min(1.0 - top),
        })
    }

    /// Normalizes a pixel rectangle by the image size.
    pub fn from_pixel_rect(x: u32, y: u32, w: u32, h: u32, img_w: u32, img_h: u32) -> Option<Self> {
        if img_w == 0 || img_h == 0 {
            return None;
        }
        let (iw, ih) = (img_w as f32, img_h as f32);
        Self::from_corners(
            x as f32 / iw,
            y as f32 / ih,
            (x + w) as f32 / iw,
            (y + h) as f32 / ih,
        )
    }

    /// Normalizes a raw detector box.
    pub fn from_raw(raw: &RawBox, img_w: u32, img_h: u32) -> Option<Self> {
        match *raw {
            RawBox::Relative { x1, y1, x2, y2 } => Self::from_corners(x1, y1, x2, y2),
            RawBox::Pixels { x1, y1, x2, y2 } => {
                if img_w == 0 || img_h == 0 {
                    return None;
                }
                let (iw, ih) = (img_w as f32, img_h as f32);
                Self::from_corners(x1 / iw, y1 / ih, x2 / iw, y2 / ih)
            }
        }
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let w = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let h = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }
}

// ----------------------------------------------------------------------------
// Final detections and the output envelope
// ----------------------------------------------------------------------------

/// Which stage produced a detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    PrimaryModel,
    Heuristic,
    Synthetic,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: String,
    pub label: TargetCategory,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: String,
    pub context: String,
    pub origin: Origin,
    #[serde(
        rename = "originalClass",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub original_label: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub forced: bool,
}

impl Detection {
    /// Builds a decorated detection. Confidence is clamped to [0, 1].
    pub fn new(
        label: TargetCategory,
        confidence: f32,
        bbox: BoundingBox,
        origin: Origin,
        original_label: Option<String>,
    ) -> Self {
        let annotation = annotate(label);
        Self {
            id: new_detection_id(),
            label,
            confidence: confidence.clamp(0.0, 1.0),
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
            color: annotation.color.to_string(),
            context: annotation.context.to_string(),
            forced: origin == Origin::Synthetic,
            origin,
            original_label,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// Output envelope for one image.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionResult {
    pub success: bool,
    pub timestamp: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub detections: Vec<Detection>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionResult {
    pub fn success(method: impl Into<String>, detections: Vec<Detection>) -> Self {
        Self {
            success: true,
            timestamp: now_iso8601(),
            method: method.into(),
            model: None,
            count: detections.len(),
            detections,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            timestamp: now_iso8601(),
            method: "none".to_string(),
            model: None,
            detections: Vec::new(),
            count: 0,
            error: Some(error.into()),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

fn new_detection_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}
