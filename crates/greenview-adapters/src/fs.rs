//! Filesystem adapter for discovering and loading images.

use std::path::{Path, PathBuf};

use greenview_core::{ImageInfo, ImageLoader, ImageReference, InferenceError};
use tracing::{debug, warn};

/// Supported image extensions.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

/// Collects image references from files and directories.
///
/// Explicit files are kept in argument order; directory contents are sorted
/// by path so repeated runs see the same order.
#[must_use]
pub fn collect_images(paths: &[PathBuf], recursive: bool) -> Vec<ImageReference> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                files.push(path.clone());
            } else {
                warn!("Unsupported file type: {}", path.display());
            }
        } else if path.is_dir() {
            collect_from_dir(path, recursive, &mut files);
        } else {
            warn!("Path does not exist: {}", path.display());
        }
    }

    debug!("Found {} image files", files.len());
    files.into_iter().map(ImageReference::from).collect()
}

fn collect_from_dir(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("Failed to read directory {}: {e}", dir.display());
            return;
        }
    };

    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        if path.is_file() && is_supported_image(&path) {
            files.push(path);
        } else if path.is_dir() && recursive {
            collect_from_dir(&path, recursive, files);
        }
    }
}

/// Checks if a path has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

/// Decodes images from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsImageLoader;

impl ImageLoader for FsImageLoader {
    fn load(&self, source: &ImageReference) -> Result<ImageInfo, InferenceError> {
        let image = image::open(source.path())
            .map_err(|e| InferenceError::Decode(format!("{source}: {e}")))?;
        Ok(ImageInfo::new(source.clone(), image))
    }
}
