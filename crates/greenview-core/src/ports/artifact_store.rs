//! Port for persisting per-image visualizations.

use std::path::PathBuf;

use image::RgbImage;

use crate::domain::ImageReference;

/// Port for saving the composite analysis image of one item.
pub trait ArtifactStore: Send + Sync {
    /// Saves `image` for `source` and returns where it was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be encoded or written.
    fn save(&self, source: &ImageReference, image: &RgbImage) -> anyhow::Result<PathBuf>;
}
