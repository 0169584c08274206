//! Batch summary statistics.

use serde::{Deserialize, Serialize};

/// Categorical green view rate bucket.
///
/// Buckets are half-open `[lo, hi)` except the top one, which is `[40, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateBucket {
    /// `[0, 10)`
    VeryLow,
    /// `[10, 20)`
    Low,
    /// `[20, 30)`
    Medium,
    /// `[30, 40)`
    High,
    /// `[40, 100]`
    VeryHigh,
}

impl RateBucket {
    /// All buckets, lowest first.
    pub const ALL: [Self; 5] = [
        Self::VeryLow,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::VeryHigh,
    ];

    /// Bucket containing `rate`.
    #[must_use]
    pub fn of(rate: f64) -> Self {
        if rate < 10.0 {
            Self::VeryLow
        } else if rate < 20.0 {
            Self::Low
        } else if rate < 30.0 {
            Self::Medium
        } else if rate < 40.0 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }

    /// Machine name, e.g. `very_low`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }

    /// Range label, e.g. `10-20%`.
    #[must_use]
    pub const fn range_label(self) -> &'static str {
        match self {
            Self::VeryLow => "0-10%",
            Self::Low => "10-20%",
            Self::Medium => "20-30%",
            Self::High => "30-40%",
            Self::VeryHigh => "40%+",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::VeryLow => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::VeryHigh => 4,
        }
    }
}

/// Count of successful records per bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    /// `[0, 10)`
    pub very_low: usize,
    /// `[10, 20)`
    pub low: usize,
    /// `[20, 30)`
    pub medium: usize,
    /// `[30, 40)`
    pub high: usize,
    /// `[40, 100]`
    pub very_high: usize,
}

impl Distribution {
    /// Counts `rates` into buckets.
    #[must_use]
    pub fn from_rates(rates: &[f64]) -> Self {
        let mut counts = [0usize; 5];
        for &rate in rates {
            counts[RateBucket::of(rate).index()] += 1;
        }
        Self {
            very_low: counts[0],
            low: counts[1],
            medium: counts[2],
            high: counts[3],
            very_high: counts[4],
        }
    }

    /// Count in `bucket`.
    #[must_use]
    pub const fn count(&self, bucket: RateBucket) -> usize {
        match bucket {
            RateBucket::VeryLow => self.very_low,
            RateBucket::Low => self.low,
            RateBucket::Medium => self.medium,
            RateBucket::High => self.high,
            RateBucket::VeryHigh => self.very_high,
        }
    }

    /// Sum over all buckets.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.very_low + self.low + self.medium + self.high + self.very_high
    }
}

/// Statistics over the green view rates of successful records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateStats {
    /// Arithmetic mean.
    pub mean: f64,
    /// 50th percentile.
    pub median: f64,
    /// Sample standard deviation (n - 1); 0 with a single sample.
    pub std_dev: f64,
    /// Smallest rate.
    pub min: f64,
    /// Largest rate.
    pub max: f64,
    /// 25th percentile.
    pub q25: f64,
    /// 75th percentile.
    pub q75: f64,
}

/// Summary derived from a record sequence. Never stored on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Records in the batch.
    pub total: usize,
    /// Successful records.
    pub succeeded: usize,
    /// Failed records.
    pub failed: usize,
    /// `100 * succeeded / total`; 0 for an empty batch.
    pub success_rate: f64,
    /// Rate statistics; absent when nothing succeeded.
    pub rates: Option<RateStats>,
    /// Bucket counts over successful records.
    pub distribution: Distribution,
}
