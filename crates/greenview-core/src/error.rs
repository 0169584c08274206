//! Error taxonomy for the analysis core.
//!
//! Item-level failures ([`InferenceError`]) are recorded on the item and never
//! abort a batch. Everything else is batch-level and surfaces to the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Model or device initialization failure. Retriable: the engine stays
/// unloaded and a later `load` may succeed.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A required model artifact is not present on disk.
    #[error("model artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// The model configuration could not be read or parsed.
    #[error("invalid model config {}: {reason}", path.display())]
    Config {
        /// Path of the offending config file.
        path: PathBuf,
        /// Parser or I/O message.
        reason: String,
    },

    /// Weights could not be read or do not match the architecture.
    #[error("failed to load weights: {0}")]
    Weights(String),
}

/// Failure classifying a single image.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// `classify` was called before a successful `load`.
    #[error("segmentation engine is not loaded")]
    NotReady,

    /// The image could not be read or decoded.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The forward pass failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The model produced output of an unexpected shape.
    #[error("unexpected model output: {0}")]
    Shape(String),
}

impl From<candle_core::Error> for InferenceError {
    fn from(e: candle_core::Error) -> Self {
        Self::Inference(e.to_string())
    }
}

/// Failure materializing a report.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The record set is empty.
    #[error("nothing to export: no analysis records")]
    NothingToExport,

    /// The destination could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Records could not be serialized.
    #[error("failed to serialize report: {0}")]
    Serialize(String),
}

/// Misuse of the batch pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// `run` called on a pipeline that already reached a terminal state.
    #[error("pipeline already finished; call reset() before running again")]
    AlreadyFinished,

    /// `run` called with an engine that has not been loaded.
    #[error("segmentation engine is not ready")]
    EngineNotReady,
}

/// What a background task can end with.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Report writing failed.
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Pipeline misuse.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The task panicked on its worker thread.
    #[error("task panicked: {0}")]
    Panicked(String),
}
