//! Mock implementations of core port traits.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use greenview_core::domain::{
    AnalysisRecord, BatchSummary, FetchedImage, GeoPoint, ImageInfo, ImageReference, LabelGrid,
    Place, PlaceQuery,
};
use greenview_core::error::{InferenceError, WriteError};
use greenview_core::pipeline::CancellationToken;
use greenview_core::ports::{
    ArtifactStore, ImageFetcher, ImageLoader, MemoryProbe, PlaceSearch, ProgressEvent,
    ProgressSink, ReclaimReason, ReportWriter, Segmenter,
};
use image::{DynamicImage, GenericImageView, RgbImage};

use crate::builders::SyntheticGridBuilder;

type Script = Box<dyn FnMut(usize, &DynamicImage) -> Result<LabelGrid, InferenceError> + Send>;

/// Call counters shared between a [`MockSegmenter`] and the test.
#[derive(Debug, Default, Clone)]
pub struct SegmenterStats {
    classify_calls: Arc<Mutex<usize>>,
    release_calls: Arc<Mutex<usize>>,
}

impl SegmenterStats {
    /// Number of `classify` calls so far.
    #[must_use]
    pub fn classify_calls(&self) -> usize {
        *self
            .classify_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of `release_cached` calls so far.
    #[must_use]
    pub fn release_calls(&self) -> usize {
        *self
            .release_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(counter: &Mutex<usize>) -> usize {
        let mut c = counter.lock().unwrap_or_else(PoisonError::into_inner);
        let before = *c;
        *c += 1;
        before
    }
}

/// Mock implementation of `Segmenter` for testing.
///
/// Produces grids from a script keyed by call index and counts calls.
pub struct MockSegmenter {
    ready: bool,
    script: Script,
    failing: HashSet<usize>,
    stats: SegmenterStats,
}

impl MockSegmenter {
    /// A ready segmenter driven by `script(call_index, image)`.
    #[must_use]
    pub fn from_fn(
        script: impl FnMut(usize, &DynamicImage) -> Result<LabelGrid, InferenceError> + Send + 'static,
    ) -> Self {
        Self {
            ready: true,
            script: Box::new(script),
            failing: HashSet::new(),
            stats: SegmenterStats::default(),
        }
    }

    /// Labels `percent` of every image's pixels as vegetation.
    #[must_use]
    pub fn with_vegetation_percent(percent: u32) -> Self {
        Self::from_fn(move |_, image| {
            let (w, h) = image.dimensions();
            Ok(SyntheticGridBuilder::with_vegetation_percent(w, h, percent))
        })
    }

    /// Uses `rates[call_index]` percent vegetation for each call.
    #[must_use]
    pub fn with_rates(rates: Vec<u32>) -> Self {
        Self::from_fn(move |call, image| {
            let (w, h) = image.dimensions();
            let percent = rates.get(call).copied().unwrap_or(0);
            Ok(SyntheticGridBuilder::with_vegetation_percent(w, h, percent))
        })
    }

    /// Makes the given call indices fail with an inference error.
    #[must_use]
    pub fn failing_at(mut self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.failing.extend(calls);
        self
    }

    /// Reports not ready, as an unloaded engine would.
    #[must_use]
    pub const fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Shared call counters.
    #[must_use]
    pub fn stats(&self) -> SegmenterStats {
        self.stats.clone()
    }
}

impl Segmenter for MockSegmenter {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn classify(&mut self, image: &DynamicImage) -> Result<LabelGrid, InferenceError> {
        if !self.ready {
            return Err(InferenceError::NotReady);
        }
        let call = SegmenterStats::bump(&self.stats.classify_calls);
        if self.failing.contains(&call) {
            return Err(InferenceError::Inference(format!("scripted failure at call {call}")));
        }
        (self.script)(call, image)
    }

    fn release_cached(&mut self) {
        SegmenterStats::bump(&self.stats.release_calls);
    }
}

/// Mock implementation of `ImageLoader` for testing.
///
/// Every reference decodes to a uniform image of a fixed size unless it was
/// marked broken. Records load order.
pub struct MockImageLoader {
    width: u32,
    height: u32,
    broken: HashSet<ImageReference>,
    loaded: Arc<Mutex<Vec<ImageReference>>>,
}

impl MockImageLoader {
    /// A loader producing 10x10 images.
    #[must_use]
    pub fn new() -> Self {
        Self {
            width: 10,
            height: 10,
            broken: HashSet::new(),
            loaded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Changes the size of produced images.
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Makes the given references fail to decode.
    #[must_use]
    pub fn broken<I, R>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ImageReference>,
    {
        self.broken.extend(sources.into_iter().map(Into::into));
        self
    }

    /// References requested so far, in order.
    #[must_use]
    pub fn loaded(&self) -> Vec<ImageReference> {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageLoader for MockImageLoader {
    fn load(&self, source: &ImageReference) -> Result<ImageInfo, InferenceError> {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source.clone());
        if self.broken.contains(source) {
            return Err(InferenceError::Decode(format!("{source}: corrupt data")));
        }
        let img = DynamicImage::ImageRgb8(RgbImage::new(self.width, self.height));
        Ok(ImageInfo::new(source.clone(), img))
    }
}

/// Mock implementation of `ProgressSink` for testing.
///
/// Captures events and can trip a cancellation token after a given number of
/// analyzed items.
pub struct MockProgressSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl MockProgressSink {
    /// Creates a new mock progress sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            cancel_after: None,
        }
    }

    /// Cancels `token` once `items` items were analyzed or downloaded.
    #[must_use]
    pub fn cancel_after(mut self, items: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((items, token));
        self
    }

    /// Returns all captured events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Indices of `Analyzed` events, in arrival order.
    #[must_use]
    pub fn analyzed_indices(&self) -> Vec<usize> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Analyzed { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    /// Number of `Downloaded` events.
    #[must_use]
    pub fn downloaded_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Downloaded { .. }))
            .count()
    }

    /// `after_items` of every reclamation pass with `reason`.
    #[must_use]
    pub fn reclaimed(&self, reason: ReclaimReason) -> Vec<usize> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Reclaimed {
                    after_items,
                    reason: r,
                    ..
                } if *r == reason => Some(*after_items),
                _ => None,
            })
            .collect()
    }

    /// Total number of reclamation passes.
    #[must_use]
    pub fn reclaim_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Reclaimed { .. }))
            .count()
    }

    /// `(succeeded, failed, cancelled)` of the `Finished` event, if any.
    #[must_use]
    pub fn finished(&self) -> Option<(usize, usize, bool)> {
        self.events().iter().find_map(|e| match e {
            ProgressEvent::Finished {
                succeeded,
                failed,
                cancelled,
                ..
            } => Some((*succeeded, *failed, *cancelled)),
            _ => None,
        })
    }

    /// Message of the `Failed` event, if any.
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        self.events().iter().find_map(|e| match e {
            ProgressEvent::Failed { message, .. } => Some(message.clone()),
            _ => None,
        })
    }
}

impl Default for MockProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for MockProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        let done = match &event {
            ProgressEvent::Analyzed { index, .. } | ProgressEvent::Downloaded { index, .. } => {
                Some(index + 1)
            }
            _ => None,
        };
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        if let (Some(done), Some((limit, token))) = (done, &self.cancel_after) {
            if done >= *limit {
                token.cancel();
            }
        }
    }
}

/// Mock implementation of `MemoryProbe` for testing.
///
/// Returns readings from a script; the last reading repeats.
pub struct MockMemoryProbe {
    readings: Mutex<Vec<Option<u64>>>,
}

impl MockMemoryProbe {
    /// Always reports `bytes`.
    #[must_use]
    pub fn fixed(bytes: Option<u64>) -> Self {
        Self::sequence(vec![bytes])
    }

    /// Reports each reading once, then repeats the last.
    #[must_use]
    pub fn sequence(readings: Vec<Option<u64>>) -> Self {
        let mut readings = readings;
        readings.reverse();
        Self {
            readings: Mutex::new(readings),
        }
    }
}

impl MemoryProbe for MockMemoryProbe {
    fn resident_bytes(&self) -> Option<u64> {
        let mut readings = self.readings.lock().unwrap_or_else(PoisonError::into_inner);
        if readings.len() > 1 {
            readings.pop().flatten()
        } else {
            readings.last().copied().flatten()
        }
    }
}

/// Mock implementation of `ArtifactStore` for testing.
pub struct MockArtifactStore {
    saved: Arc<Mutex<Vec<(ImageReference, (u32, u32))>>>,
    fail: bool,
}

impl MockArtifactStore {
    /// A store that accepts every image.
    #[must_use]
    pub fn new() -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// A store that rejects every image.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Saved references with the dimensions of their composites.
    #[must_use]
    pub fn saved(&self) -> Vec<(ImageReference, (u32, u32))> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore for MockArtifactStore {
    fn save(&self, source: &ImageReference, image: &RgbImage) -> anyhow::Result<PathBuf> {
        if self.fail {
            anyhow::bail!("disk full");
        }
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((source.clone(), image.dimensions()));
        Ok(PathBuf::from(format!("artifacts/{}_analysis.png", source.stem())))
    }
}

/// Mock implementation of `ReportWriter` for testing.
///
/// Captures what it was asked to write.
#[derive(Default)]
pub struct MockReportWriter {
    written: Arc<Mutex<Vec<(usize, BatchSummary, PathBuf)>>>,
}

impl MockReportWriter {
    /// Creates a new mock writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `(record count, summary, destination)` of every write.
    #[must_use]
    pub fn written(&self) -> Vec<(usize, BatchSummary, PathBuf)> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// A writer sharing this one's capture buffer, for handing off as a box.
    #[must_use]
    pub fn handle(&self) -> Self {
        Self {
            written: Arc::clone(&self.written),
        }
    }
}

impl ReportWriter for MockReportWriter {
    fn write(
        &self,
        records: &[AnalysisRecord],
        summary: &BatchSummary,
        destination: &Path,
    ) -> Result<(), WriteError> {
        if records.is_empty() {
            return Err(WriteError::NothingToExport);
        }
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((records.len(), summary.clone(), destination.to_path_buf()));
        Ok(())
    }
}

/// Mock implementation of `ImageFetcher` for testing.
///
/// Succeeds without touching the network or disk, except at failing call indices.
pub struct MockImageFetcher {
    failing: HashSet<usize>,
    calls: Mutex<usize>,
}

impl MockImageFetcher {
    /// A fetcher that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            calls: Mutex::new(0),
        }
    }

    /// Makes the given call indices fail.
    #[must_use]
    pub fn failing_at(mut self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.failing.extend(calls);
        self
    }
}

impl Default for MockImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageFetcher for MockImageFetcher {
    fn fetch(&self, point: &GeoPoint, save_dir: &Path) -> anyhow::Result<FetchedImage> {
        let call = SegmenterStats::bump(&self.calls);
        if self.failing.contains(&call) {
            anyhow::bail!("HTTP 500 for {point}");
        }
        Ok(FetchedImage {
            path: save_dir.join(format!("streetview_{}_{}.jpg", point.lng, point.lat)),
            bytes: 1024,
        })
    }
}

/// A place search over a fixed number of results per query.
///
/// Query `text` yields `results_per_query` places named `<text> #<n>`,
/// served `page_size` at a time. Every request is recorded.
pub struct MockPlaceSearch {
    page_size: usize,
    results_per_query: usize,
    failing_text: Option<String>,
    requests: Mutex<Vec<(PlaceQuery, u32)>>,
}

impl MockPlaceSearch {
    /// A search returning `results_per_query` places per query.
    #[must_use]
    pub const fn new(page_size: usize, results_per_query: usize) -> Self {
        Self {
            page_size,
            results_per_query,
            failing_text: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Makes queries with this text fail.
    #[must_use]
    pub fn failing_for(mut self, text: impl Into<String>) -> Self {
        self.failing_text = Some(text.into());
        self
    }

    /// Requests made so far, as `(query, page)`.
    #[must_use]
    pub fn requests(&self) -> Vec<(PlaceQuery, u32)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PlaceSearch for MockPlaceSearch {
    fn page_size(&self) -> usize {
        self.page_size
    }

    #[allow(clippy::cast_precision_loss)]
    fn search_page(&self, query: &PlaceQuery, page: u32) -> anyhow::Result<Vec<Place>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((query.clone(), page));
        if self.failing_text.as_deref() == Some(query.text.as_str()) {
            anyhow::bail!("service rejected '{}'", query.text);
        }

        let start = page as usize * self.page_size;
        let end = (start + self.page_size).min(self.results_per_query);
        (start..end)
            .map(|n| {
                let location = GeoPoint::new(116.0 + n as f64 * 0.001, 39.9)
                    .map_err(anyhow::Error::msg)?;
                Ok(Place {
                    name: format!("{} #{n}", query.text),
                    address: query.region.clone(),
                    location,
                    region: query.region.clone(),
                    uid: format!("uid-{n}"),
                })
            })
            .collect()
    }
}
