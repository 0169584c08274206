//! Core domain types for green view analysis.

mod image;
mod labels;
mod location;
mod record;
mod summary;

pub use image::{ImageInfo, ImageReference};
pub use labels::{ClassNames, LabelGrid, CITYSCAPES_CLASSES, VEGETATION_CLASS_ID};
pub use location::{
    dedup_places, format_locations, parse_locations, DownloadOutcome, DownloadRecord, FetchedImage,
    GeoPoint, Place, PlaceQuery,
};
pub use record::{
    timestamp_now, AnalysisMetrics, AnalysisRecord, ClassBreakdown, ClassShare, ItemOutcome,
};
pub use summary::{BatchSummary, Distribution, RateBucket, RateStats};
