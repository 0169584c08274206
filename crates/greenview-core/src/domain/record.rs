//! Per-image analysis records.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ImageReference;

/// Pixel count and share of one class within an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassShare {
    /// Class id as emitted by the model.
    pub class_id: u32,
    /// Human-readable class name.
    pub name: String,
    /// Pixels carrying this class.
    pub pixel_count: u64,
    /// `100 * pixel_count / total_pixel_count`.
    pub percentage: f64,
}

/// Classes present in an image, ordered by class id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassBreakdown(Vec<ClassShare>);

impl ClassBreakdown {
    /// Wraps shares; callers keep them ordered by id.
    #[must_use]
    pub const fn new(shares: Vec<ClassShare>) -> Self {
        Self(shares)
    }

    /// Share of the class named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ClassShare> {
        self.0.iter().find(|s| s.name == name)
    }

    /// Iterates shares in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ClassShare> {
        self.0.iter()
    }

    /// Number of classes present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no class is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Metrics reduced from one label grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    /// Percentage of pixels classified as vegetation, in `[0, 100]`.
    pub green_view_rate: f64,
    /// Pixels classified as vegetation.
    pub vegetation_pixel_count: u64,
    /// Pixels in the image.
    pub total_pixel_count: u64,
    /// Every class present at least once.
    pub class_breakdown: ClassBreakdown,
}

/// Outcome of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// The image was segmented and reduced.
    Success(AnalysisMetrics),
    /// The image could not be analyzed.
    Failed {
        /// Human-readable reason.
        reason: String,
    },
}

/// One entry per processed image. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// The analyzed image.
    pub source: ImageReference,
    /// When the item finished (RFC 3339, UTC).
    pub analyzed_at: String,
    /// Success metrics or failure reason.
    #[serde(flatten)]
    pub outcome: ItemOutcome,
    /// Composite visualization written for this image, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

impl AnalysisRecord {
    /// Record for a successfully analyzed image.
    #[must_use]
    pub fn success(source: ImageReference, metrics: AnalysisMetrics) -> Self {
        Self {
            source,
            analyzed_at: timestamp_now(),
            outcome: ItemOutcome::Success(metrics),
            artifact: None,
        }
    }

    /// Record for an image that could not be analyzed.
    #[must_use]
    pub fn failed(source: ImageReference, reason: impl Into<String>) -> Self {
        Self {
            source,
            analyzed_at: timestamp_now(),
            outcome: ItemOutcome::Failed {
                reason: reason.into(),
            },
            artifact: None,
        }
    }

    /// Attaches the path of a saved visualization.
    #[must_use]
    pub fn with_artifact(mut self, path: PathBuf) -> Self {
        self.artifact = Some(path);
        self
    }

    /// Returns true for successful items.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Success(_))
    }

    /// Green view rate; 0 for failed items.
    #[must_use]
    pub const fn green_view_rate(&self) -> f64 {
        match &self.outcome {
            ItemOutcome::Success(m) => m.green_view_rate,
            ItemOutcome::Failed { .. } => 0.0,
        }
    }

    /// Metrics of a successful item.
    #[must_use]
    pub const fn metrics(&self) -> Option<&AnalysisMetrics> {
        match &self.outcome {
            ItemOutcome::Success(m) => Some(m),
            ItemOutcome::Failed { .. } => None,
        }
    }

    /// Reason of a failed item.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            ItemOutcome::Success(_) => None,
            ItemOutcome::Failed { reason } => Some(reason),
        }
    }
}

/// Current UTC time as RFC 3339.
#[must_use]
pub fn timestamp_now() -> String {
    match time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339) {
        Ok(ts) => ts,
        Err(e) => {
            debug!("Timestamp format failed: {e}");
            String::from("1970-01-01T00:00:00Z")
        }
    }
}
