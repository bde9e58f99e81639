//! Last-resort placeholder detections.
//!
//! One detection per category from a fixed table, placed in separate parts of
//! the frame. Identical on every call apart from detection ids.

use crate::category::TargetCategory;
use crate::detect::{BoundingBox, Detection, Origin};

pub(crate) struct Placement {
    pub category: TargetCategory,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

pub(crate) const PLACEMENTS: [Placement; 3] = [
    // upper left
    Placement {
        category: TargetCategory::Toolbox,
        confidence: 0.85,
        bbox: BoundingBox {
            x: 0.20,
            y: 0.20,
            width: 0.40,
            height: 0.30,
        },
    },
    // right, middle
    Placement {
        category: TargetCategory::FireExtinguisher,
        confidence: 0.92,
        bbox: BoundingBox {
            x: 0.70,
            y: 0.30,
            width: 0.25,
            height: 0.50,
        },
    },
    // lower middle
    Placement {
        category: TargetCategory::OxygenTank,
        confidence: 0.78,
        bbox: BoundingBox {
            x: 0.40,
            y: 0.60,
            width: 0.30,
            height: 0.30,
        },
    },
];

/// Placeholder detections, one per target category, tagged `synthetic`.
pub fn synthetic_detections() -> Vec<Detection> {
    PLACEMENTS
        .iter()
        .map(|p| Detection::new(p.category, p.confidence, p.bbox, Origin::Synthetic, None))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_every_category_once() {
        let detections = synthetic_detections();
        let labels: Vec<_> = detections.iter().map(|d| d.label).collect();
        assert_eq!(labels, TargetCategory::ALL.to_vec());
        assert!(detections.iter().all(|d| d.origin == Origin::Synthetic && d.forced));
        assert!(detections
            .iter()
            .all(|d| (0.75..=0.95).contains(&d.confidence)));
    }

    #[test]
    fn is_deterministic() {
        let key = |d: &Detection| (d.label, d.confidence, d.x, d.y, d.width, d.height);
        let first: Vec<_> = synthetic_detections().iter().map(key).collect();
        let second: Vec<_> = synthetic_detections().iter().map(key).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn boxes_stay_inside_frame_and_apart() {
        let detections = synthetic_detections();
        for d in &detections {
            assert!(d.x >= 0.0 && d.y >= 0.0);
            assert!(d.x + d.width <= 1.0 + 1e-6);
            assert!(d.y + d.height <= 1.0 + 1e-6);
        }
        for (i, a) in detections.iter().enumerate() {
            for b in &detections[i + 1..] {
                assert!(a.bbox().intersection_area(&b.bbox()) < 1e-4);
            }
        }
    }
}
