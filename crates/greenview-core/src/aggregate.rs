//! Accumulation of analysis records and summary statistics.

use crate::domain::{AnalysisRecord, BatchSummary, Distribution, RateStats};

/// Ordered store of analysis records for one or more batches.
///
/// Holds records only; label grids never reach it.
#[derive(Debug, Default, Clone)]
pub struct ResultAggregator {
    records: Vec<AnalysisRecord>,
}

impl ResultAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Appends one record, preserving insertion order.
    pub fn append(&mut self, record: AnalysisRecord) {
        self.records.push(record);
    }

    /// Appends every record of a batch in order.
    pub fn extend(&mut self, records: impl IntoIterator<Item = AnalysisRecord>) {
        self.records.extend(records);
    }

    /// Records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[AnalysisRecord] {
        &self.records
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no record is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Recomputes the summary from the current records.
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        summarize(&self.records)
    }

    /// Discards all records.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Computes a summary over `records`. Rate statistics and the distribution
/// cover successful records only.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize(records: &[AnalysisRecord]) -> BatchSummary {
    let rates: Vec<f64> = records
        .iter()
        .filter_map(|r| r.metrics().map(|m| m.green_view_rate))
        .collect();

    let total = records.len();
    let succeeded = rates.len();
    let success_rate = if total == 0 {
        0.0
    } else {
        100.0 * succeeded as f64 / total as f64
    };

    BatchSummary {
        total,
        succeeded,
        failed: total - succeeded,
        success_rate,
        rates: rate_stats(&rates),
        distribution: Distribution::from_rates(&rates),
    }
}

#[allow(clippy::cast_precision_loss)]
fn rate_stats(rates: &[f64]) -> Option<RateStats> {
    if rates.is_empty() {
        return None;
    }

    let mut sorted = rates.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let std_dev = if sorted.len() < 2 {
        0.0
    } else {
        let ss: f64 = sorted.iter().map(|r| (r - mean).powi(2)).sum();
        (ss / (n - 1.0)).sqrt()
    };

    Some(RateStats {
        mean,
        median: quantile(&sorted, 0.5),
        std_dev,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        q25: quantile(&sorted, 0.25),
        q75: quantile(&sorted, 0.75),
    })
}

/// Linear interpolation between closest ranks over sorted, non-empty data.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnalysisMetrics, ClassBreakdown, RateBucket};

    fn success(name: &str, rate: f64) -> AnalysisRecord {
        AnalysisRecord::success(
            name.into(),
            AnalysisMetrics {
                green_view_rate: rate,
                vegetation_pixel_count: 0,
                total_pixel_count: 1,
                class_breakdown: ClassBreakdown::default(),
            },
        )
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_summary_of_three_rates() {
        let mut agg = ResultAggregator::new();
        agg.append(success("a", 10.0));
        agg.append(success("b", 20.0));
        agg.append(success("c", 30.0));

        let s = agg.summary();
        let stats = s.rates.unwrap_or_else(|| panic!("stats expected"));
        assert_eq!(s.total, 3);
        assert_eq!(s.succeeded, 3);
        assert!(close(stats.mean, 20.0));
        assert!(close(stats.median, 20.0));
        assert!(close(stats.min, 10.0));
        assert!(close(stats.max, 30.0));
        assert!(close(stats.std_dev, 10.0));
        assert!(close(stats.q25, 15.0));
        assert!(close(stats.q75, 25.0));

        assert_eq!(s.distribution.count(RateBucket::VeryLow), 0);
        assert_eq!(s.distribution.count(RateBucket::Low), 1);
        assert_eq!(s.distribution.count(RateBucket::Medium), 1);
        assert_eq!(s.distribution.count(RateBucket::High), 1);
        assert_eq!(s.distribution.count(RateBucket::VeryHigh), 0);
    }

    #[test]
    fn test_failed_records_excluded_from_stats() {
        let mut agg = ResultAggregator::new();
        agg.append(success("a", 40.0));
        agg.append(AnalysisRecord::failed("b".into(), "unreadable"));

        let s = agg.summary();
        assert_eq!(s.total, 2);
        assert_eq!(s.failed, 1);
        assert!(close(s.success_rate, 50.0));
        let stats = s.rates.unwrap_or_else(|| panic!("stats expected"));
        assert!(close(stats.mean, 40.0));
        assert!(close(stats.std_dev, 0.0));
        assert_eq!(s.distribution.total(), 1);
        assert_eq!(s.distribution.very_high, 1);
    }

    #[test]
    fn test_all_failed_has_no_stats() {
        let mut agg = ResultAggregator::new();
        agg.append(AnalysisRecord::failed("a".into(), "x"));
        let s = agg.summary();
        assert!(s.rates.is_none());
        assert_eq!(s.distribution.total(), 0);
        assert!(close(s.success_rate, 0.0));
    }

    #[test]
    fn test_empty_summary() {
        let s = ResultAggregator::new().summary();
        assert_eq!(s.total, 0);
        assert!(s.rates.is_none());
    }

    #[test]
    fn test_median_of_even_count_interpolates() {
        let records = [success("a", 1.0), success("b", 2.0), success("c", 3.0), success("d", 10.0)];
        let stats = summarize(&records).rates.unwrap_or_else(|| panic!("stats expected"));
        assert!(close(stats.median, 2.5));
        assert!(close(stats.q25, 1.75));
        assert!(close(stats.q75, 4.75));
    }

    #[test]
    fn test_append_preserves_order_and_clear() {
        let mut agg = ResultAggregator::new();
        agg.extend([success("first", 1.0), success("second", 2.0)]);
        agg.append(success("third", 3.0));
        let names: Vec<String> = agg.records().iter().map(|r| r.source.to_string()).collect();
        assert_eq!(names, ["first", "second", "third"]);

        agg.clear();
        assert!(agg.is_empty());
        assert_eq!(agg.summary().total, 0);
    }
}
