//! Filesystem store for per-image analysis composites.

use std::path::PathBuf;

use anyhow::{Context, Result};
use greenview_core::{ArtifactStore, ImageReference};
use image::RgbImage;
use tracing::debug;

/// Saves composites as `{stem}_analysis.png` in one directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store writing into `dir`; the directory is created on first save.
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save(&self, source: &ImageReference, image: &RgbImage) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.dir.join(format!("{}_analysis.png", source.stem()));
        image
            .save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        debug!("Saved analysis image {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_saves_png_named_after_stem() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("out"));
        let path = store
            .save(&ImageReference::from("/data/streetview_1_2.jpg"), &RgbImage::new(6, 2))
            .unwrap();

        assert_eq!(path, dir.path().join("out/streetview_1_2_analysis.png"));
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (6, 2));
    }
}
