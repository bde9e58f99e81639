use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

/// An 8-connected group of foreground pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_count: u32,
}

impl Region {
    /// Width over height; 0 for a degenerate region.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn bbox_area(&self) -> u32 {
        self.width * self.height
    }
}

struct Extent {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    count: u32,
}

/// Foreground regions of a binary mask, in raster order of their first pixel.
pub fn foreground_regions(mask: &GrayImage) -> Vec<Region> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut order: Vec<u32> = Vec::new();
    let mut extents: HashMap<u32, Extent> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0];
        if label == 0 {
            continue;
        }
        extents
            .entry(label)
            .and_modify(|e| {
                e.min_x = e.min_x.min(x);
                e.min_y = e.min_y.min(y);
                e.max_x = e.max_x.max(x);
                e.max_y = e.max_y.max(y);
                e.count += 1;
            })
            .or_insert_with(|| {
                order.push(label);
                Extent {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                    count: 1,
                }
            });
    }

    order
        .into_iter()
        .filter_map(|label| extents.get(&label))
        .map(|e| Region {
            x: e.min_x,
            y: e.min_y,
            width: e.max_x - e.min_x + 1,
            height: e.max_y - e.min_y + 1,
            pixel_count: e.count,
        })
        .collect()
}
