//! Reduction of a label grid into green view metrics.

use std::collections::BTreeMap;

use crate::domain::{AnalysisMetrics, ClassBreakdown, ClassNames, ClassShare, LabelGrid};

/// Reduces `grid` to a green view rate and per-class breakdown.
///
/// Pure and deterministic: the same grid always yields bit-identical metrics.
/// Classes that never occur are omitted from the breakdown.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn reduce(grid: &LabelGrid, vegetation_class_id: u32, names: &ClassNames) -> AnalysisMetrics {
    let mut counts: BTreeMap<u32, u64> = BTreeMap::new();
    for &label in grid.labels() {
        *counts.entry(label).or_insert(0) += 1;
    }

    let total = grid.pixel_count();
    let vegetation = counts.get(&vegetation_class_id).copied().unwrap_or(0);
    let percent = |count: u64| 100.0 * count as f64 / total as f64;

    let shares = counts
        .into_iter()
        .map(|(class_id, pixel_count)| ClassShare {
            class_id,
            name: names.name(class_id).into_owned(),
            pixel_count,
            percentage: percent(pixel_count),
        })
        .collect();

    AnalysisMetrics {
        green_view_rate: percent(vegetation),
        vegetation_pixel_count: vegetation,
        total_pixel_count: total,
        class_breakdown: ClassBreakdown::new(shares),
    }
}
