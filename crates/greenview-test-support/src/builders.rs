//! Synthetic image and label grid builders for testing.

use std::path::{Path, PathBuf};

use greenview_core::domain::{ImageInfo, LabelGrid, VEGETATION_CLASS_ID};
use image::{DynamicImage, Rgb, RgbImage};

/// Cityscapes id used as filler for non-vegetation pixels.
pub const ROAD_CLASS_ID: u32 = 0;

/// Builder for synthetic label grids.
pub struct SyntheticGridBuilder;

impl SyntheticGridBuilder {
    /// A grid whose first `vegetation` pixels (row-major) are vegetation and
    /// the rest road.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions are zero.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_vegetation_pixels(width: u32, height: u32, vegetation: usize) -> LabelGrid {
        let n = width as usize * height as usize;
        let labels = (0..n)
            .map(|i| {
                if i < vegetation {
                    VEGETATION_CLASS_ID
                } else {
                    ROAD_CLASS_ID
                }
            })
            .collect();
        LabelGrid::new(width, height, labels).expect("non-empty grid")
    }

    /// A grid where `percent` of the pixels (rounded down) are vegetation.
    #[must_use]
    pub fn with_vegetation_percent(width: u32, height: u32, percent: u32) -> LabelGrid {
        let n = width as usize * height as usize;
        Self::with_vegetation_pixels(width, height, n * percent.min(100) as usize / 100)
    }

    /// A grid cycling through `classes` pixel by pixel.
    ///
    /// # Panics
    ///
    /// Panics if `classes` is empty or the dimensions are zero.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn cycling(width: u32, height: u32, classes: &[u32]) -> LabelGrid {
        let n = width as usize * height as usize;
        let labels = (0..n).map(|i| classes[i % classes.len()]).collect();
        LabelGrid::new(width, height, labels).expect("non-empty grid")
    }
}

/// Builder for synthetic street-like images.
pub struct SyntheticImageBuilder;

impl SyntheticImageBuilder {
    /// A uniform RGB image.
    #[must_use]
    pub fn rgb_uniform(width: u32, height: u32, rgb: [u8; 3]) -> ImageInfo {
        let img = RgbImage::from_pixel(width, height, Rgb(rgb));
        ImageInfo::new("synthetic://uniform", DynamicImage::ImageRgb8(img))
    }

    /// Sky on the top third, foliage in the middle, road at the bottom.
    #[must_use]
    pub fn street_scene(width: u32, height: u32) -> ImageInfo {
        let img = RgbImage::from_fn(width, height, |_, y| {
            if y < height / 3 {
                Rgb([70, 130, 180])
            } else if y < 2 * height / 3 {
                Rgb([107, 142, 35])
            } else {
                Rgb([128, 64, 128])
            }
        });
        ImageInfo::new("synthetic://street", DynamicImage::ImageRgb8(img))
    }

    /// Writes a street scene PNG named `name` into `dir` and returns its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> anyhow::Result<PathBuf> {
        let path = dir.join(name);
        Self::street_scene(width, height).image.save(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_vegetation_percent() {
        let grid = SyntheticGridBuilder::with_vegetation_percent(10, 10, 25);
        let veg = grid
            .labels()
            .iter()
            .filter(|&&l| l == VEGETATION_CLASS_ID)
            .count();
        assert_eq!(veg, 25);
    }

    #[test]
    fn test_cycling_grid() {
        let grid = SyntheticGridBuilder::cycling(3, 1, &[1, 2]);
        assert_eq!(grid.labels(), &[1, 2, 1]);
    }

    #[test]
    fn test_street_scene_bands() {
        let info = SyntheticImageBuilder::street_scene(6, 6);
        let rgb = info.image.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [70, 130, 180]);
        assert_eq!(rgb.get_pixel(0, 3).0, [107, 142, 35]);
        assert_eq!(rgb.get_pixel(0, 5).0, [128, 64, 128]);
    }

    #[test]
    fn test_write_png() {
        let dir = std::env::temp_dir().join(format!("greenview-builders-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = SyntheticImageBuilder::write_png(&dir, "scene.png", 8, 4).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (8, 4));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
