//! Greenview Core - Domain logic, segmentation engine and batch pipeline.
//!
//! This crate computes the green view rate of street-level images: the share
//! of pixels a semantic segmentation model labels as vegetation. It contains
//! the domain types, the metric reducer, the cancelable batch pipeline with
//! its resource reclamation, the result aggregator, the task/worker layer
//! front ends drive it through, and sample location collection.

pub mod aggregate;
pub mod artifacts;
pub mod domain;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod places;
pub mod ports;
pub mod reducer;
pub mod tasks;

pub use aggregate::{summarize, ResultAggregator};
pub use domain::{
    AnalysisMetrics, AnalysisRecord, BatchSummary, ClassNames, ImageInfo, ImageReference,
    ItemOutcome, LabelGrid,
};
pub use error::{InferenceError, LoadError, PipelineError, TaskError, WriteError};
pub use pipeline::{BatchOutcome, BatchPipeline, CancellationToken, PipelineSettings, RunStatus};
pub use ports::{
    ArtifactStore, ImageFetcher, ImageLoader, MemoryProbe, PlaceSearch, ProgressEvent,
    ProgressSink, ReportWriter, Segmenter,
};
pub use reducer::reduce;
