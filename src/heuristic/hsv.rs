//! RGB → HSV conversion in OpenCV's 8-bit convention.
//!
//! Hue is halved to fit a byte (0..=180), saturation and value span 0..=255.

use image::{GrayImage, Luma, RgbImage};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub fn from_rgb([r, g, b]: [u8; 3]) -> Self {
        let (rf, gf, bf) = (r as f32, g as f32, b as f32);
        let max = rf.max(gf).max(bf);
        let min = rf.min(gf).min(bf);
        let delta = max - min;

        let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };
        let mut h = if delta == 0.0 {
            0.0
        } else if max == rf {
            60.0 * (gf - bf) / delta
        } else if max == gf {
            120.0 + 60.0 * (bf - rf) / delta
        } else {
            240.0 + 60.0 * (rf - gf) / delta
        };
        if h < 0.0 {
            h += 360.0;
        }

        Self {
            h: (h / 2.0).round().clamp(0.0, 180.0) as u8,
            s: s.round().clamp(0.0, 255.0) as u8,
            v: max as u8,
        }
    }
}

/// Inclusive hue/saturation/value range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HsvBand {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvBand {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.lower[0]..=self.upper[0]).contains(&hsv.h)
            && (self.lower[1]..=self.upper[1]).contains(&hsv.s)
            && (self.lower[2]..=self.upper[2]).contains(&hsv.v)
    }
}

/// Image converted to HSV once and reused by every band.
pub struct HsvImage {
    width: u32,
    height: u32,
    pixels: Vec<Hsv>,
}

impl HsvImage {
    pub fn from_rgb(img: &RgbImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            pixels: img.pixels().map(|p| Hsv::from_rgb(p.0)).collect(),
        }
    }

    /// Binary mask (255 = inside any band).
    pub fn mask(&self, bands: &[HsvBand]) -> GrayImage {
        let mut mask = GrayImage::new(self.width, self.height);
        for (out, hsv) in mask.pixels_mut().zip(&self.pixels) {
            if bands.iter().any(|band| band.contains(*hsv)) {
                *out = Luma([255]);
            }
        }
        mask
    }
}
