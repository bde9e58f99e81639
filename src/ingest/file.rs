//! Local file image source.
//!
//! Decodes still images (PNG, JPEG) from local paths into RGB pixels. Alpha
//! and 16-bit formats are flattened to 8-bit RGB.

use std::path::Path;

use image::RgbImage;

use super::{ImageSource, ImageUnreadable};

#[derive(Clone, Copy, Debug, Default)]
pub struct FileImageSource;

impl FileImageSource {
    pub fn new() -> Self {
        Self
    }
}

impl ImageSource for FileImageSource {
    fn load(&self, path: &Path) -> Result<RgbImage, ImageUnreadable> {
        if !path.exists() {
            return Err(ImageUnreadable::NotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(ImageUnreadable::NotAFile(path.to_path_buf()));
        }
        let decoded = image::open(path).map_err(|e| ImageUnreadable::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let rgb = decoded.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(ImageUnreadable::Empty(path.to_path_buf()));
        }
        log::debug!(
            "FileImageSource: decoded {} ({}x{})",
            path.display(),
            rgb.width(),
            rgb.height()
        );
        Ok(rgb)
    }
}
