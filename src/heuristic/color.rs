//! Color-band pass: one HSV band per category, then a shape filter per region.

use image::RgbImage;

use super::hsv::{HsvBand, HsvImage};
use super::regions::{foreground_regions, Region};
use super::{Candidate, HeuristicConfig, HeuristicPass};
use crate::category::TargetCategory;
use crate::detect::BoundingBox;

struct ColorRule {
    category: TargetCategory,
    bands: &'static [HsvBand],
    /// Area (px) that adds 1.0 to the base confidence.
    area_scale: f32,
    max_confidence: f32,
}

const BASE_CONFIDENCE: f32 = 0.5;

// Red wraps around the hue axis, so it needs two bands.
const RED: &[HsvBand] = &[
    HsvBand::new([0, 120, 70], [10, 255, 255]),
    HsvBand::new([170, 120, 70], [180, 255, 255]),
];
const BLUE: &[HsvBand] = &[HsvBand::new([90, 50, 50], [130, 255, 255])];
const YELLOW: &[HsvBand] = &[HsvBand::new([20, 100, 100], [40, 255, 255])];

const RULES: [ColorRule; 3] = [
    ColorRule {
        category: TargetCategory::FireExtinguisher,
        bands: RED,
        area_scale: 10_000.0,
        max_confidence: 0.95,
    },
    ColorRule {
        category: TargetCategory::OxygenTank,
        bands: BLUE,
        area_scale: 15_000.0,
        max_confidence: 0.90,
    },
    ColorRule {
        category: TargetCategory::Toolbox,
        bands: YELLOW,
        area_scale: 12_000.0,
        max_confidence: 0.92,
    },
];

/// Shape check a region must pass to count as its category.
fn plausible_shape(category: TargetCategory, region: &Region) -> bool {
    let aspect = region.aspect_ratio();
    match category {
        // tall
        TargetCategory::FireExtinguisher => aspect < 0.8 && region.height > 50,
        // roughly square
        TargetCategory::OxygenTank => aspect > 0.5 && aspect < 1.5,
        // wide
        TargetCategory::Toolbox => aspect > 0.8 && region.width > 50,
    }
}

fn area_confidence(rule: &ColorRule, area: u32) -> f32 {
    (BASE_CONFIDENCE + area as f32 / rule.area_scale).min(rule.max_confidence)
}

pub(super) fn color_pass(img: &RgbImage, config: &HeuristicConfig, threshold: f32) -> Vec<Candidate> {
    let hsv = HsvImage::from_rgb(img);
    let (width, height) = img.dimensions();
    let mut candidates = Vec::new();

    for rule in &RULES {
        let mask = hsv.mask(rule.bands);
        for region in foreground_regions(&mask) {
            if region.pixel_count < config.min_color_area {
                continue;
            }
            if !plausible_shape(rule.category, &region) {
                continue;
            }
            let confidence = area_confidence(rule, region.pixel_count);
            if confidence < threshold {
                continue;
            }
            let Some(bbox) = BoundingBox::from_pixel_rect(
                region.x,
                region.y,
                region.width,
                region.height,
                width,
                height,
            ) else {
                continue;
            };
            candidates.push(Candidate {
                category: rule.category,
                confidence,
                bbox,
                pass: HeuristicPass::ColorBand,
            });
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn canvas() -> RgbImage {
        RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]))
    }

    fn paint(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        for yy in y..y + h {
            for xx in x..x + w {
                img.put_pixel(xx, yy, Rgb(color));
            }
        }
    }

    #[test]
    fn tall_red_region_is_fire_extinguisher() {
        let mut img = canvas();
        paint(&mut img, 40, 30, 10, 60, [230, 20, 20]);
        let found = color_pass(&img, &HeuristicConfig::default(), 0.25);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category, TargetCategory::FireExtinguisher);
        assert!((found[0].confidence - 0.56).abs() < 1e-4);
        assert!((found[0].bbox.x - 0.2).abs() < 1e-6);
        assert!((found[0].bbox.height - 0.3).abs() < 1e-6);
    }

    #[test]
    fn shape_filters_reject_wrong_geometry() {
        let mut img = canvas();
        // wide red bar: not a fire extinguisher
        paint(&mut img, 10, 10, 80, 10, [230, 20, 20]);
        // narrow yellow post: not a toolbox
        paint(&mut img, 150, 100, 10, 60, [250, 220, 0]);
        assert!(color_pass(&img, &HeuristicConfig::default(), 0.25).is_empty());
    }

    #[test]
    fn categories_are_reported_in_fixed_order() {
        let mut img = canvas();
        paint(&mut img, 10, 10, 80, 40, [250, 220, 0]);
        paint(&mut img, 120, 120, 30, 30, [20, 60, 230]);
        paint(&mut img, 150, 10, 15, 70, [230, 20, 20]);
        let labels: Vec<_> = color_pass(&img, &HeuristicConfig::default(), 0.25)
            .into_iter()
            .map(|c| c.category)
            .collect();
        assert_eq!(
            labels,
            vec![
                TargetCategory::FireExtinguisher,
                TargetCategory::OxygenTank,
                TargetCategory::Toolbox
            ]
        );
    }

    #[test]
    fn small_or_low_confidence_regions_are_dropped() {
        let mut img = canvas();
        paint(&mut img, 20, 20, 12, 12, [20, 60, 230]);
        assert!(color_pass(&img, &HeuristicConfig::default(), 0.25).is_empty());

        let mut img = canvas();
        paint(&mut img, 20, 20, 30, 30, [20, 60, 230]);
        assert_eq!(color_pass(&img, &HeuristicConfig::default(), 0.25).len(), 1);
        assert!(color_pass(&img, &HeuristicConfig::default(), 0.8).is_empty());
    }

    #[test]
    fn confidence_saturates_below_one() {
        let rule = &RULES[0];
        assert_eq!(area_confidence(rule, 1_000_000), 0.95);
        assert!(area_confidence(rule, 600) < area_confidence(rule, 3000));
    }
}
