//! Edge pass: second-chance shape heuristics when no color band matched.

use image::RgbImage;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;

use super::regions::{foreground_regions, Region};
use super::{Candidate, HeuristicConfig, HeuristicPass};
use crate::category::TargetCategory;
use crate::detect::BoundingBox;

/// Coarse category guess from outline geometry alone.
fn classify(region: &Region) -> Option<(TargetCategory, f32)> {
    let aspect = region.aspect_ratio();
    if aspect < 0.7 && region.height > region.width {
        Some((TargetCategory::FireExtinguisher, 0.70))
    } else if aspect > 0.9 && aspect < 1.1 {
        Some((TargetCategory::OxygenTank, 0.60))
    } else if aspect > 1.2 {
        Some((TargetCategory::Toolbox, 0.65))
    } else {
        None
    }
}

pub(super) fn edge_pass(img: &RgbImage, config: &HeuristicConfig, threshold: f32) -> Vec<Candidate> {
    let gray = image::imageops::grayscale(img);
    // canny smooths again internally (sigma 1.4); the two blurs stack to
    // sqrt(blur_sigma^2 + 1.4^2)
    let blurred = gaussian_blur_f32(&gray, config.blur_sigma);
    let edges = canny(&blurred, config.canny_low, config.canny_high);
    // close one-pixel gaps so an outline stays a single region
    let edges = dilate(&edges, Norm::LInf, 1);
    let (width, height) = img.dimensions();

    foreground_regions(&edges)
        .into_iter()
        // outlines are thin, so judge size by the enclosed box
        .filter(|region| region.bbox_area() >= config.min_edge_area)
        .filter_map(|region| {
            let (category, confidence) = classify(&region)?;
            if confidence < threshold {
                return None;
            }
            let bbox = BoundingBox::from_pixel_rect(
                region.x,
                region.y,
                region.width,
                region.height,
                width,
                height,
            )?;
            Some(Candidate {
                category,
                confidence,
                bbox,
                pass: HeuristicPass::EdgeShape,
            })
        })
        .collect()
}
