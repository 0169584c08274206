//! Test support utilities for greenview.
//!
//! Provides mocks, synthetic image and label grid builders for testing the
//! batch analysis pipeline without a real segmentation model.
//!
//! # Example
//!
//! ```
//! use greenview_test_support::{MockImageLoader, MockSegmenter, SyntheticGridBuilder};
//!
//! // A grid that is one quarter vegetation
//! let grid = SyntheticGridBuilder::with_vegetation_percent(10, 10, 25);
//!
//! // A segmenter that reports 40% vegetation for every image
//! let segmenter = MockSegmenter::with_vegetation_percent(40);
//!
//! // A loader where one reference fails to decode
//! let loader = MockImageLoader::new().broken(["broken.jpg"]);
//! ```

mod builders;
mod mocks;

pub use builders::{SyntheticGridBuilder, SyntheticImageBuilder, ROAD_CLASS_ID};
pub use mocks::{
    MockArtifactStore, MockImageFetcher, MockImageLoader, MockMemoryProbe, MockPlaceSearch,
    MockProgressSink, MockReportWriter, MockSegmenter, SegmenterStats,
};
