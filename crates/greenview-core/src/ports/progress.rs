//! Progress reporting port for front-end integration.

use std::fmt;

use crate::domain::{AnalysisRecord, DownloadRecord};

/// Kind of background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Street-level image acquisition.
    Download,
    /// Batch segmentation analysis.
    Analyze,
    /// Report export.
    Export,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Download => "download",
            Self::Analyze => "analyze",
            Self::Export => "export",
        })
    }
}

/// Why a reclamation pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimReason {
    /// Every K items.
    Cadence,
    /// Resident memory crossed the configured threshold.
    MemoryPressure,
    /// The run completed.
    Completed,
    /// The run was cancelled.
    Cancelled,
}

/// Events emitted by background tasks, in order, from the worker thread.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A task started.
    Started {
        /// Task kind.
        kind: TaskKind,
        /// Items to process.
        total: usize,
    },
    /// One image was analyzed (successfully or not).
    Analyzed {
        /// Position in the batch (0-based).
        index: usize,
        /// Items in the batch.
        total: usize,
        /// The record produced for this image.
        record: AnalysisRecord,
    },
    /// One location was fetched (successfully or not).
    Downloaded {
        /// Position in the batch (0-based).
        index: usize,
        /// Locations in the batch.
        total: usize,
        /// The record produced for this location.
        record: DownloadRecord,
    },
    /// A reclamation pass ran.
    Reclaimed {
        /// Items processed so far.
        after_items: usize,
        /// What triggered the pass.
        reason: ReclaimReason,
        /// Resident bytes before the pass, if known.
        resident_before: Option<u64>,
        /// Resident bytes after the pass, if known.
        resident_after: Option<u64>,
    },
    /// A task ended normally or by cancellation.
    Finished {
        /// Task kind.
        kind: TaskKind,
        /// Items that succeeded.
        succeeded: usize,
        /// Items that failed.
        failed: usize,
        /// Whether the task stopped early on request.
        cancelled: bool,
    },
    /// A task ended with a batch-level error.
    Failed {
        /// Task kind.
        kind: TaskKind,
        /// Error message.
        message: String,
    },
}

/// Port for receiving progress events.
pub trait ProgressSink: Send + Sync {
    /// Called when a progress event occurs.
    fn on_event(&self, event: ProgressEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_event(&self, _event: ProgressEvent) {}
}
