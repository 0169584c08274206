//! Greenview Adapters - External adapters for greenview.
//!
//! This crate provides adapters for:
//! - Filesystem image discovery and decoding
//! - Model downloading and caching
//! - CSV and JSON reports
//! - Process memory sampling
//! - Analysis composite storage
//! - Street-level panorama fetching
//! - Place search for sample locations

pub mod artifacts;
pub mod fetch;
pub mod fs;
pub mod memory;
pub mod models;
pub mod places;
pub mod report;

pub use artifacts::FsArtifactStore;
pub use fetch::{PanoramaFetcher, PanoramaParams};
pub use fs::{collect_images, FsImageLoader};
pub use memory::SysinfoProbe;
pub use models::{model_files, model_path, models_dir};
pub use places::BaiduPlaceSearch;
pub use report::{CsvReport, JsonDocument, JsonReport, ReportFormat};
