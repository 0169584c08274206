//! Street-level image acquisition port.

use std::path::Path;

use crate::domain::{FetchedImage, GeoPoint};

/// Port for fetching the image at one location.
pub trait ImageFetcher: Send + Sync {
    /// Fetches the image at `point` into `save_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the response is not an image,
    /// or the file cannot be written.
    fn fetch(&self, point: &GeoPoint, save_dir: &Path) -> anyhow::Result<FetchedImage>;
}
