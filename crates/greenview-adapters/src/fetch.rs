//! Street-level panorama fetcher over the Baidu Maps static panorama API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use greenview_core::domain::{FetchedImage, GeoPoint};
use greenview_core::ImageFetcher;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

const PANORAMA_URL: &str = "https://api.map.baidu.com/panorama/v2";

/// Hardcoded defaults for panorama requests.
pub mod defaults {
    /// Image width in pixels.
    pub const WIDTH: u32 = 1024;
    /// Image height in pixels.
    pub const HEIGHT: u32 = 512;
    /// Horizontal field of view in degrees.
    pub const FOV: u32 = 180;
    /// Coordinate system of request locations.
    pub const COORDTYPE: &str = "wgs84ll";
    /// Request timeout in seconds.
    pub const TIMEOUT_SECS: u64 = 30;
}

/// Request parameters besides the location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanoramaParams {
    /// API access key.
    pub ak: String,
    /// Image width, 10..=4096.
    pub width: u32,
    /// Image height, 10..=512.
    pub height: u32,
    /// Field of view, 10..=360.
    pub fov: u32,
    /// Coordinate system, e.g. `wgs84ll` or `bd09ll`.
    pub coordtype: String,
}

impl PanoramaParams {
    /// Parameters with default size, field of view and coordinate system.
    #[must_use]
    pub fn new(ak: impl Into<String>) -> Self {
        Self {
            ak: ak.into(),
            width: defaults::WIDTH,
            height: defaults::HEIGHT,
            fov: defaults::FOV,
            coordtype: defaults::COORDTYPE.to_string(),
        }
    }

    /// Clamps values into the ranges the API accepts.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.width = self.width.clamp(10, 4096);
        self.height = self.height.clamp(10, 512);
        self.fov = self.fov.clamp(10, 360);
        self
    }
}

/// Fetches one panorama per location and saves it as JPEG.
pub struct PanoramaFetcher {
    client: Client,
    params: PanoramaParams,
    endpoint: String,
}

impl PanoramaFetcher {
    /// Creates a fetcher against the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(params: PanoramaParams) -> Result<Self> {
        Self::with_endpoint(params, PANORAMA_URL)
    }

    /// Creates a fetcher against a custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_endpoint(params: PanoramaParams, endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            params: params.clamped(),
            endpoint: endpoint.into(),
        })
    }
}

/// File name for the panorama at `point`.
#[must_use]
pub fn panorama_filename(point: &GeoPoint) -> String {
    format!("streetview_{}_{}.jpg", point.lng, point.lat)
}

impl ImageFetcher for PanoramaFetcher {
    fn fetch(&self, point: &GeoPoint, save_dir: &Path) -> Result<FetchedImage> {
        let query = [
            ("ak", self.params.ak.clone()),
            ("width", self.params.width.to_string()),
            ("height", self.params.height.to_string()),
            ("location", point.to_string()),
            ("fov", self.params.fov.to_string()),
            ("coordtype", self.params.coordtype.clone()),
        ];
        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .send()
            .with_context(|| format!("Request for {point} failed"))?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP {} for {point}", response.status());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("image/") {
            // The API reports errors as a JSON body with a 200 status
            let body = response.text().unwrap_or_default();
            anyhow::bail!(
                "Expected an image for {point}, got '{content_type}': {}",
                body.chars().take(200).collect::<String>()
            );
        }

        let bytes = response
            .bytes()
            .with_context(|| format!("Failed to read image for {point}"))?;

        std::fs::create_dir_all(save_dir)
            .with_context(|| format!("Failed to create {}", save_dir.display()))?;
        let path: PathBuf = save_dir.join(panorama_filename(point));
        std::fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        debug!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(FetchedImage {
            path,
            bytes: bytes.len() as u64,
        })
    }
}
