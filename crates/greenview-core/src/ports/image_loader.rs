//! Image loading port.

use crate::domain::{ImageInfo, ImageReference};
use crate::error::InferenceError;

/// Port for decoding one referenced image.
pub trait ImageLoader: Send + Sync {
    /// Loads and decodes the image behind `source`.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::Decode`] if the image cannot be read or decoded.
    fn load(&self, source: &ImageReference) -> Result<ImageInfo, InferenceError>;
}
