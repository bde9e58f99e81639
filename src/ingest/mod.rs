//! Image sources.
//!
//! An image source resolves a reference (normally a local path) to decoded RGB
//! pixels, or reports why it could not. `ImageUnreadable` is the only failure
//! the resolution pipeline surfaces to its caller.

pub mod file;

use std::path::{Path, PathBuf};

use image::RgbImage;

pub use file::FileImageSource;

/// Why an image could not be used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageUnreadable {
    NotFound(PathBuf),
    NotAFile(PathBuf),
    Decode { path: PathBuf, reason: String },
    Empty(PathBuf),
}

impl ImageUnreadable {
    pub fn path(&self) -> &Path {
        match self {
            ImageUnreadable::NotFound(path)
            | ImageUnreadable::NotAFile(path)
            | ImageUnreadable::Empty(path) => path,
            ImageUnreadable::Decode { path, .. } => path,
        }
    }
}

impl std::fmt::Display for ImageUnreadable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageUnreadable::NotFound(path) => {
                write!(f, "image file not found: {}", path.display())
            }
            ImageUnreadable::NotAFile(path) => {
                write!(f, "image path is not a file: {}", path.display())
            }
            ImageUnreadable::Decode { path, reason } => {
                write!(f, "failed to read image {}: {}", path.display(), reason)
            }
            ImageUnreadable::Empty(path) => {
                write!(f, "image has no pixels: {}", path.display())
            }
        }
    }
}
impl std::error::Error for ImageUnreadable {}

/// Source of decoded images.
pub trait ImageSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<RgbImage, ImageUnreadable>;
}
