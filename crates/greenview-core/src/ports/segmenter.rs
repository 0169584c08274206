//! Segmentation capability port.

use image::DynamicImage;

use crate::domain::LabelGrid;
use crate::error::InferenceError;

/// A loaded model that labels every pixel of an image.
///
/// The returned grid has the same dimensions as the input image.
pub trait Segmenter: Send {
    /// Returns true once the model is loaded and bound to a device.
    fn is_ready(&self) -> bool;

    /// Classifies every pixel of `image`.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::NotReady`] before a successful load, or
    /// another [`InferenceError`] if this image cannot be classified.
    fn classify(&mut self, image: &DynamicImage) -> Result<LabelGrid, InferenceError>;

    /// Releases cached host and device buffers between items.
    fn release_cached(&mut self) {}
}
