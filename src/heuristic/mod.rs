//! Model-free candidate generation.
//!
//! Used when the primary detector is missing or found nothing usable. Two
//! passes run in order and the second only runs when the first is empty:
//!
//! - color bands: HSV masks per category (red, blue, yellow), connected
//!   regions, minimum area, per-category shape filter, area-based confidence
//! - edge shapes: grayscale, blur, Canny, outline regions classified by aspect
//!   ratio alone
//!
//! Boxes come out normalized to the image size.

mod color;
mod edges;
pub mod hsv;
pub mod regions;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::category::TargetCategory;
use crate::detect::BoundingBox;

/// Tunables for both passes.
#[derive(Clone, Debug, PartialEq)]
pub struct HeuristicConfig {
    /// Minimum region size (pixels) for the color pass.
    pub min_color_area: u32,
    /// Minimum outline box size (pixels) for the edge pass.
    pub min_edge_area: u32,
    /// Pre-blur for the edge pass. Canny adds its own sigma 1.4 blur on top.
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            min_color_area: 300,
            min_edge_area: 500,
            blur_sigma: 1.1,
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

impl HeuristicConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.blur_sigma > 0.0 && self.blur_sigma.is_finite()) {
            return Err(anyhow!("blur_sigma must be a positive number"));
        }
        if !(self.canny_low >= 0.0 && self.canny_low < self.canny_high) {
            return Err(anyhow!("canny thresholds must satisfy 0 <= low < high"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeuristicPass {
    ColorBand,
    EdgeShape,
}

impl HeuristicPass {
    /// Recorded as the detection's `originalClass`.
    pub fn label(self) -> &'static str {
        match self {
            HeuristicPass::ColorBand => "color-detection",
            HeuristicPass::EdgeShape => "edge-detection",
        }
    }
}

/// A heuristic proposal, not yet decorated for output.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub category: TargetCategory,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub pass: HeuristicPass,
}

#[derive(Clone, Debug, Default)]
pub struct HeuristicDetector {
    config: HeuristicConfig,
}

impl HeuristicDetector {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    /// Runs the color pass, then the edge pass if colors found nothing.
    ///
    /// An empty list is a normal outcome. Errors mean the analysis itself could
    /// not run (empty pixel buffer, unusable tunables).
    pub fn detect(&self, img: &RgbImage, threshold: f32) -> Result<Vec<Candidate>> {
        if img.width() == 0 || img.height() == 0 {
            return Err(anyhow!("image has no pixels"));
        }
        self.config.validate()?;

        let found = color::color_pass(img, &self.config, threshold);
        if !found.is_empty() {
            log::debug!("heuristic: color pass found {} candidate(s)", found.len());
            return Ok(found);
        }

        let found = edges::edge_pass(img, &self.config, threshold);
        log::debug!("heuristic: edge pass found {} candidate(s)", found.len());
        Ok(found)
    }
}
