//! Port definitions for hexagonal architecture.
//!
//! These traits define the boundaries between the analysis core and external adapters.

mod artifact_store;
mod fetcher;
mod image_loader;
mod memory;
mod place_search;
mod progress;
mod report;
mod segmenter;

pub use artifact_store::ArtifactStore;
pub use fetcher::ImageFetcher;
pub use image_loader::ImageLoader;
pub use memory::MemoryProbe;
pub use place_search::PlaceSearch;
pub use progress::{NullProgress, ProgressEvent, ProgressSink, ReclaimReason, TaskKind};
pub use report::ReportWriter;
pub use segmenter::Segmenter;
