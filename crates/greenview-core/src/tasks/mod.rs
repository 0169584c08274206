//! Background task kinds.
//!
//! Each kind is an explicit type implementing [`Task`]; the worker in
//! [`worker`] runs any of them on a dedicated thread.

pub mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::aggregate::summarize;
use crate::domain::{
    timestamp_now, AnalysisRecord, BatchSummary, DownloadOutcome, DownloadRecord, GeoPoint,
    ImageReference,
};
use crate::error::TaskError;
use crate::pipeline::{BatchOutcome, BatchPipeline, CancellationToken, PipelinePorts, PipelineSettings};
use crate::ports::{
    ArtifactStore, ImageFetcher, ImageLoader, MemoryProbe, ProgressEvent, ProgressSink,
    ReportWriter, Segmenter, TaskKind,
};

/// A unit of background work with a single entry point.
pub trait Task: Send + 'static {
    /// What a successful run produces.
    type Output: Send + 'static;

    /// Kind reported in progress events.
    const KIND: TaskKind;

    /// Runs the task to completion or cancellation.
    ///
    /// # Errors
    ///
    /// Returns a [`TaskError`] for batch-level failures. Item-level failures
    /// are part of the output.
    fn execute(
        self,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<Self::Output, TaskError>;
}

/// Segments a batch of images with an already-loaded engine.
pub struct AnalyzeTask {
    /// Images in processing order.
    pub images: Vec<ImageReference>,
    /// Loaded engine; handed back in the output.
    pub segmenter: Box<dyn Segmenter>,
    /// Pipeline settings.
    pub settings: PipelineSettings,
    /// Decoder for image references.
    pub loader: Arc<dyn ImageLoader>,
    /// Resident memory sampler.
    pub memory: Arc<dyn MemoryProbe>,
    /// Where composites go when `settings.save_artifacts` is set.
    pub artifacts: Option<Arc<dyn ArtifactStore>>,
}

/// Output of [`AnalyzeTask`].
pub struct AnalyzeOutput {
    /// Records and run status.
    pub outcome: BatchOutcome,
    /// Summary over the records.
    pub summary: BatchSummary,
    /// The engine, ready for another batch.
    pub segmenter: Box<dyn Segmenter>,
}

impl Task for AnalyzeTask {
    type Output = AnalyzeOutput;
    const KIND: TaskKind = TaskKind::Analyze;

    fn execute(
        mut self,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<AnalyzeOutput, TaskError> {
        let mut pipeline = BatchPipeline::new(self.settings).with_cancellation(cancel.clone());
        let mut ports = PipelinePorts::new(self.loader.as_ref(), progress, self.memory.as_ref());
        if let Some(store) = &self.artifacts {
            ports = ports.with_artifacts(store.as_ref());
        }

        let outcome = pipeline.run(&self.images, self.segmenter.as_mut(), ports)?;
        let summary = summarize(&outcome.records);
        Ok(AnalyzeOutput {
            outcome,
            summary,
            segmenter: self.segmenter,
        })
    }
}

/// Writes records and their summary through a report writer.
pub struct ExportTask {
    /// Records to export, in order.
    pub records: Vec<AnalysisRecord>,
    /// Target file.
    pub destination: PathBuf,
    /// Format-specific writer.
    pub writer: Box<dyn ReportWriter>,
}

/// Output of [`ExportTask`].
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// Written file; `None` if cancelled before writing.
    pub destination: Option<PathBuf>,
    /// Summary that was written.
    pub summary: BatchSummary,
}

impl Task for ExportTask {
    type Output = ExportOutput;
    const KIND: TaskKind = TaskKind::Export;

    fn execute(
        self,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<ExportOutput, TaskError> {
        progress.on_event(ProgressEvent::Started {
            kind: TaskKind::Export,
            total: self.records.len(),
        });
        let summary = summarize(&self.records);

        let destination = if cancel.is_cancelled() {
            None
        } else {
            self.writer
                .write(&self.records, &summary, &self.destination)?;
            info!(
                "Exported {} records to {}",
                self.records.len(),
                self.destination.display()
            );
            Some(self.destination)
        };

        progress.on_event(ProgressEvent::Finished {
            kind: TaskKind::Export,
            succeeded: summary.succeeded,
            failed: summary.failed,
            cancelled: destination.is_none(),
        });
        Ok(ExportOutput {
            destination,
            summary,
        })
    }
}

/// Fetches street-level images for a list of locations.
pub struct DownloadTask {
    /// Locations in request order.
    pub locations: Vec<GeoPoint>,
    /// Directory the fetcher writes into.
    pub save_dir: PathBuf,
    /// Acquisition adapter.
    pub fetcher: Box<dyn ImageFetcher>,
}

/// Output of [`DownloadTask`].
#[derive(Debug, Clone)]
pub struct DownloadOutput {
    /// One record per attempted location.
    pub records: Vec<DownloadRecord>,
    /// Whether the task stopped early on request.
    pub cancelled: bool,
}

impl DownloadOutput {
    /// Paths of the images that were saved, in request order.
    #[must_use]
    pub fn saved_images(&self) -> Vec<ImageReference> {
        self.records
            .iter()
            .filter_map(|r| r.saved_path().cloned().map(ImageReference::from))
            .collect()
    }
}

impl Task for DownloadTask {
    type Output = DownloadOutput;
    const KIND: TaskKind = TaskKind::Download;

    fn execute(
        self,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<DownloadOutput, TaskError> {
        let total = self.locations.len();
        progress.on_event(ProgressEvent::Started {
            kind: TaskKind::Download,
            total,
        });

        let mut records = Vec::with_capacity(total);
        let mut cancelled = false;
        for (index, location) in self.locations.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let outcome = match self.fetcher.fetch(location, &self.save_dir) {
                Ok(image) => DownloadOutcome::Saved(image),
                Err(e) => {
                    warn!("Failed to fetch {location}: {e:#}");
                    DownloadOutcome::Failed {
                        reason: format!("{e:#}"),
                    }
                }
            };
            let record = DownloadRecord {
                location: *location,
                fetched_at: timestamp_now(),
                outcome,
            };
            progress.on_event(ProgressEvent::Downloaded {
                index,
                total,
                record: record.clone(),
            });
            records.push(record);
        }

        let succeeded = records.iter().filter(|r| r.saved_path().is_some()).count();
        progress.on_event(ProgressEvent::Finished {
            kind: TaskKind::Download,
            succeeded,
            failed: records.len() - succeeded,
            cancelled,
        });
        Ok(DownloadOutput { records, cancelled })
    }
}
