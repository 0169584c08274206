//! Visualizations of a segmentation result.
//!
//! The composite written per image is three panels side by side: the
//! original, the vegetation highlight, and the class overlay.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use image::{imageops, DynamicImage, Rgb, RgbImage};

use crate::domain::LabelGrid;

/// Cityscapes colour per class id. Unknown ids render grey.
pub const CITYSCAPES_PALETTE: [[u8; 3]; 19] = [
    [128, 64, 128],
    [244, 35, 232],
    [70, 70, 70],
    [102, 102, 156],
    [190, 153, 153],
    [153, 153, 153],
    [250, 170, 30],
    [220, 220, 0],
    [107, 142, 35],
    [152, 251, 152],
    [70, 130, 180],
    [220, 20, 60],
    [255, 0, 0],
    [0, 0, 142],
    [0, 0, 70],
    [0, 60, 100],
    [0, 80, 100],
    [0, 0, 230],
    [119, 11, 32],
];

const UNKNOWN_COLOR: [u8; 3] = [128, 128, 128];
const HIGHLIGHT: [u8; 3] = [0, 255, 0];
const DIM_FACTOR: f32 = 0.6;
const OVERLAY_ALPHA: f32 = 0.6;

/// Palette colour of `class_id`.
#[must_use]
pub fn class_color(class_id: u32) -> [u8; 3] {
    CITYSCAPES_PALETTE
        .get(class_id as usize)
        .copied()
        .unwrap_or(UNKNOWN_COLOR)
}

/// Paints vegetation pure green and dims everything else.
///
/// `original` must have the grid's dimensions.
#[must_use]
pub fn vegetation_highlight(original: &RgbImage, grid: &LabelGrid, vegetation_class_id: u32) -> RgbImage {
    RgbImage::from_fn(grid.width(), grid.height(), |x, y| {
        if grid.get(x, y) == Some(vegetation_class_id) {
            Rgb(HIGHLIGHT)
        } else {
            let p = original.get_pixel(x, y).0;
            Rgb(p.map(|c| (f32::from(c) * DIM_FACTOR) as u8))
        }
    })
}

/// Blends the palette colour of every pixel over the original.
#[must_use]
pub fn segmentation_overlay(original: &RgbImage, grid: &LabelGrid) -> RgbImage {
    RgbImage::from_fn(grid.width(), grid.height(), |x, y| {
        let base = original.get_pixel(x, y).0;
        let color = class_color(grid.get(x, y).unwrap_or(u32::MAX));
        let mut out = [0u8; 3];
        for c in 0..3 {
            let v = f32::from(base[c]).mul_add(1.0 - OVERLAY_ALPHA, f32::from(color[c]) * OVERLAY_ALPHA);
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    })
}

/// Renders original, highlight and overlay panels side by side.
#[must_use]
pub fn render_composite(original: &DynamicImage, grid: &LabelGrid, vegetation_class_id: u32) -> RgbImage {
    let (w, h) = (grid.width(), grid.height());
    let mut rgb = original.to_rgb8();
    if rgb.dimensions() != (w, h) {
        rgb = imageops::resize(&rgb, w, h, imageops::FilterType::Triangle);
    }

    let mut canvas = RgbImage::new(w * 3, h);
    imageops::replace(&mut canvas, &rgb, 0, 0);
    imageops::replace(&mut canvas, &vegetation_highlight(&rgb, grid, vegetation_class_id), i64::from(w), 0);
    imageops::replace(&mut canvas, &segmentation_overlay(&rgb, grid), i64::from(w) * 2, 0);
    canvas
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::VEGETATION_CLASS_ID;

    fn grey(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([100, 100, 100]))
    }

    #[test]
    fn test_highlight_paints_vegetation_and_dims_rest() {
        let grid = LabelGrid::new(2, 1, vec![VEGETATION_CLASS_ID, 0]).unwrap();
        let out = vegetation_highlight(&grey(2, 1), &grid, VEGETATION_CLASS_ID);
        assert_eq!(out.get_pixel(0, 0).0, [0, 255, 0]);
        assert_eq!(out.get_pixel(1, 0).0, [60, 60, 60]);
    }

    #[test]
    fn test_overlay_blends_palette() {
        let grid = LabelGrid::filled(1, 1, 12).unwrap();
        let out = segmentation_overlay(&grey(1, 1), &grid);
        // 100 * 0.4 + 255 * 0.6 = 193, 100 * 0.4 = 40
        assert_eq!(out.get_pixel(0, 0).0, [193, 40, 40]);
    }

    #[test]
    fn test_unknown_class_is_grey() {
        assert_eq!(class_color(200), [128, 128, 128]);
        assert_eq!(class_color(VEGETATION_CLASS_ID), [107, 142, 35]);
    }

    #[test]
    fn test_composite_is_three_panels_wide() {
        let grid = LabelGrid::filled(4, 3, VEGETATION_CLASS_ID).unwrap();
        let original = DynamicImage::ImageRgb8(grey(4, 3));
        let out = render_composite(&original, &grid, VEGETATION_CLASS_ID);
        assert_eq!(out.dimensions(), (12, 3));
        assert_eq!(out.get_pixel(0, 0).0, [100, 100, 100]);
        assert_eq!(out.get_pixel(4, 0).0, [0, 255, 0]);
    }
}
