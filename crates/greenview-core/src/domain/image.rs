//! Image references and decoded images.

use std::fmt;
use std::path::{Path, PathBuf};

use image::GenericImageView;
use serde::{Deserialize, Serialize};

/// Opaque locator for one input image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageReference(PathBuf);

impl ImageReference {
    /// Creates a reference from a path or identifier.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Returns the underlying path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Returns the file stem, used to name derived artifacts.
    #[must_use]
    pub fn stem(&self) -> String {
        self.0
            .file_stem()
            .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned())
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for ImageReference {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&str> for ImageReference {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

/// A decoded image together with the reference it was loaded from.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Where the image came from.
    pub source: ImageReference,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Decoded image data.
    pub image: image::DynamicImage,
}

impl ImageInfo {
    /// Wraps a decoded image.
    #[must_use]
    pub fn new(source: impl Into<ImageReference>, image: image::DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            source: source.into(),
            width,
            height,
            image,
        }
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_info_dimensions() {
        let info = ImageInfo::new("a.jpg", image::DynamicImage::new_rgb8(12, 7));
        assert_eq!(info.width, 12);
        assert_eq!(info.height, 7);
        assert_eq!(info.pixel_count(), 84);
        assert_eq!(info.source.to_string(), "a.jpg");
    }

    #[test]
    fn test_reference_stem() {
        assert_eq!(ImageReference::from("/data/street_01.png").stem(), "street_01");
        assert_eq!(ImageReference::from("/").stem(), "image");
    }
}
