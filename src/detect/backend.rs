use std::path::Path;

use anyhow::Result;
use image::RgbImage;

use crate::detect::result::RawDetections;

/// What a primary detector is handed for one image.
///
/// Out-of-process backends read the file at `path`; in-process backends run on
/// the already-decoded `image`.
pub struct PrimaryInput<'a> {
    pub path: &'a Path,
    pub image: &'a RgbImage,
}

impl<'a> PrimaryInput<'a> {
    pub fn new(path: &'a Path, image: &'a RgbImage) -> Self {
        Self { path, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Primary (learned) detector backend.
///
/// Backends are opaque collaborators: they return boxes in the model's own
/// vocabulary and may fail for any reason. The resolution pipeline absorbs
/// every error returned here and moves on to the heuristic stage, so
/// implementations should report failure through `Err` rather than by
/// returning fabricated detections.
pub trait DetectorBackend: Send {
    /// Backend identifier. Also used as the result `method` tag.
    fn name(&self) -> &'static str;

    /// Model file the backend runs, if any.
    fn model_name(&self) -> Option<String> {
        None
    }

    /// Run detection on one image, keeping boxes at or above `threshold`.
    fn detect(&mut self, input: &PrimaryInput<'_>, threshold: f32) -> Result<RawDetections>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
