//! Batch analysis pipeline.
//!
//! Runs the segmentation engine and metric reducer over a list of images in
//! input order. Per-item failures become `Failed` records and never stop the
//! batch. Cancellation is checked between items. Engine caches are reclaimed
//! every `cleanup_cadence` items, whenever resident memory crosses the
//! configured threshold, and once when the run ends.

mod cancel;

use std::time::Instant;

use tracing::{debug, info, warn};

pub use cancel::CancellationToken;

use crate::artifacts::render_composite;
use crate::domain::{AnalysisRecord, ClassNames, ImageReference, VEGETATION_CLASS_ID};
use crate::error::PipelineError;
use crate::ports::{
    ArtifactStore, ImageLoader, MemoryProbe, ProgressEvent, ProgressSink, ReclaimReason,
    Segmenter, TaskKind,
};
use crate::reducer::reduce;

/// Hardcoded defaults for pipeline settings.
pub mod defaults {
    /// Items between deep reclamation passes.
    pub const CLEANUP_CADENCE: usize = 5;
    /// Resident memory that triggers an extra reclamation pass.
    pub const MEMORY_THRESHOLD_BYTES: u64 = 1024 * 1024 * 1024;
}

/// Knobs consumed by the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Class id counted as vegetation.
    pub vegetation_class_id: u32,
    /// Names used in class breakdowns.
    pub class_names: ClassNames,
    /// Items between reclamation passes; values below 1 behave as 1.
    pub cleanup_cadence: usize,
    /// Reclaim whenever resident memory exceeds this; `None` disables the check.
    pub memory_threshold_bytes: Option<u64>,
    /// Render and store a composite image per successful item.
    pub save_artifacts: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            vegetation_class_id: VEGETATION_CLASS_ID,
            class_names: ClassNames::cityscapes(),
            cleanup_cadence: defaults::CLEANUP_CADENCE,
            memory_threshold_bytes: Some(defaults::MEMORY_THRESHOLD_BYTES),
            save_artifacts: false,
        }
    }
}

/// Adapters the pipeline talks to during a run.
#[derive(Clone, Copy)]
pub struct PipelinePorts<'a> {
    loader: &'a dyn ImageLoader,
    progress: &'a dyn ProgressSink,
    memory: &'a dyn MemoryProbe,
    artifacts: Option<&'a dyn ArtifactStore>,
}

impl<'a> PipelinePorts<'a> {
    /// Bundles the required ports.
    #[must_use]
    pub const fn new(
        loader: &'a dyn ImageLoader,
        progress: &'a dyn ProgressSink,
        memory: &'a dyn MemoryProbe,
    ) -> Self {
        Self {
            loader,
            progress,
            memory,
            artifacts: None,
        }
    }

    /// Adds a store for per-item composites.
    #[must_use]
    pub const fn with_artifacts(mut self, store: &'a dyn ArtifactStore) -> Self {
        self.artifacts = Some(store);
        self
    }
}

/// Lifecycle of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Ready to run.
    Idle,
    /// Processing items.
    Running,
    /// Every item was processed.
    Completed,
    /// Stopped early on request.
    Cancelled,
}

/// How a run ended. Cancellation is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every item was processed.
    Completed,
    /// Stopped early; records cover the items processed before the request.
    Cancelled,
}

/// Records produced by one run, in input order.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// One record per processed item.
    pub records: Vec<AnalysisRecord>,
    /// How the run ended.
    pub status: RunStatus,
}

/// Progress of the current or last run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunState {
    /// Items in the batch.
    pub total_items: usize,
    /// Items processed so far.
    pub current_index: usize,
    /// Whether the run stopped on request.
    pub cancelled: bool,
}

/// Single-threaded batch runner with cooperative cancellation.
pub struct BatchPipeline {
    settings: PipelineSettings,
    phase: Phase,
    state: RunState,
    cancel: CancellationToken,
}

impl BatchPipeline {
    /// Creates an idle pipeline with its own cancellation token.
    #[must_use]
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            phase: Phase::Idle,
            state: RunState::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` instead of the pipeline's own cancellation flag.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this pipeline from any thread.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Snapshot of run progress.
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Returns a finished pipeline to `Idle` with a fresh cancellation token.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.state = RunState::default();
        self.cancel = CancellationToken::new();
    }

    /// Processes `images` in order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AlreadyFinished`] if the pipeline reached a
    /// terminal phase without a [`reset`](Self::reset), or
    /// [`PipelineError::EngineNotReady`] if `segmenter` is not loaded.
    /// Item failures are never errors.
    pub fn run(
        &mut self,
        images: &[ImageReference],
        segmenter: &mut dyn Segmenter,
        ports: PipelinePorts<'_>,
    ) -> Result<BatchOutcome, PipelineError> {
        if self.phase != Phase::Idle {
            return Err(PipelineError::AlreadyFinished);
        }
        if !segmenter.is_ready() {
            return Err(PipelineError::EngineNotReady);
        }

        let total = images.len();
        let cadence = self.settings.cleanup_cadence.max(1);
        self.phase = Phase::Running;
        self.state = RunState {
            total_items: total,
            current_index: 0,
            cancelled: false,
        };
        info!("Analyzing {total} images");
        ports.progress.on_event(ProgressEvent::Started {
            kind: TaskKind::Analyze,
            total,
        });

        let mut records = Vec::with_capacity(total);
        for (index, source) in images.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("Cancelled after {index} of {total} images");
                self.state.cancelled = true;
                break;
            }

            let record = self.process_one(source, segmenter, ports);
            self.state.current_index = index + 1;
            ports.progress.on_event(ProgressEvent::Analyzed {
                index,
                total,
                record: record.clone(),
            });
            records.push(record);

            let done = index + 1;
            if done % cadence == 0 {
                reclaim(segmenter, ports, done, ReclaimReason::Cadence);
            } else if self.over_memory_threshold(ports.memory) {
                reclaim(segmenter, ports, done, ReclaimReason::MemoryPressure);
            }
        }

        let (status, reason) = if self.state.cancelled {
            self.phase = Phase::Cancelled;
            (RunStatus::Cancelled, ReclaimReason::Cancelled)
        } else {
            self.phase = Phase::Completed;
            (RunStatus::Completed, ReclaimReason::Completed)
        };
        reclaim(segmenter, ports, records.len(), reason);

        let succeeded = records.iter().filter(|r| r.is_success()).count();
        ports.progress.on_event(ProgressEvent::Finished {
            kind: TaskKind::Analyze,
            succeeded,
            failed: records.len() - succeeded,
            cancelled: status == RunStatus::Cancelled,
        });

        Ok(BatchOutcome { records, status })
    }

    fn process_one(
        &self,
        source: &ImageReference,
        segmenter: &mut dyn Segmenter,
        ports: PipelinePorts<'_>,
    ) -> AnalysisRecord {
        let started = Instant::now();

        let info = match ports.loader.load(source) {
            Ok(info) => info,
            Err(e) => {
                warn!("Failed to load {source}: {e}");
                return AnalysisRecord::failed(source.clone(), e.to_string());
            }
        };

        let grid = match segmenter.classify(&info.image) {
            Ok(grid) => grid,
            Err(e) => {
                warn!("Failed to analyze {source}: {e}");
                return AnalysisRecord::failed(source.clone(), e.to_string());
            }
        };
        if (grid.width(), grid.height()) != (info.width, info.height) {
            warn!("Label grid for {source} does not match image size");
            return AnalysisRecord::failed(
                source.clone(),
                format!(
                    "label grid is {}x{}, image is {}x{}",
                    grid.width(),
                    grid.height(),
                    info.width,
                    info.height
                ),
            );
        }

        let metrics = reduce(
            &grid,
            self.settings.vegetation_class_id,
            &self.settings.class_names,
        );
        debug!(
            "{source}: green view rate {:.2}% in {:?}",
            metrics.green_view_rate,
            started.elapsed()
        );
        let mut record = AnalysisRecord::success(source.clone(), metrics);

        if self.settings.save_artifacts {
            if let Some(store) = ports.artifacts {
                let composite =
                    render_composite(&info.image, &grid, self.settings.vegetation_class_id);
                match store.save(source, &composite) {
                    Ok(path) => record = record.with_artifact(path),
                    Err(e) => warn!("Failed to save analysis image for {source}: {e:#}"),
                }
            }
        }

        drop(grid);
        record
    }

    fn over_memory_threshold(&self, memory: &dyn MemoryProbe) -> bool {
        match (self.settings.memory_threshold_bytes, memory.resident_bytes()) {
            (Some(limit), Some(resident)) => resident > limit,
            _ => false,
        }
    }
}

/// The single reclamation seam: release engine caches and report memory.
fn reclaim(
    segmenter: &mut dyn Segmenter,
    ports: PipelinePorts<'_>,
    after_items: usize,
    reason: ReclaimReason,
) {
    let resident_before = ports.memory.resident_bytes();
    segmenter.release_cached();
    let resident_after = ports.memory.resident_bytes();
    debug!(
        "Reclaimed after {after_items} items ({reason:?}): {} -> {} MiB",
        mib(resident_before),
        mib(resident_after)
    );
    ports.progress.on_event(ProgressEvent::Reclaimed {
        after_items,
        reason,
        resident_before,
        resident_after,
    });
}

fn mib(bytes: Option<u64>) -> String {
    bytes.map_or_else(|| "?".to_string(), |b| (b / (1024 * 1024)).to_string())
}
