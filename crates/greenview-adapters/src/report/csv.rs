//! CSV report with a per-image detail table and a summary table.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use greenview_core::domain::{RateBucket, RateStats};
use greenview_core::{AnalysisRecord, BatchSummary, ReportWriter, WriteError};

use super::{create, io_error};

/// Writes a CSV file with two sections separated by a blank line.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReport;

impl ReportWriter for CsvReport {
    fn write(
        &self,
        records: &[AnalysisRecord],
        summary: &BatchSummary,
        destination: &Path,
    ) -> Result<(), WriteError> {
        if records.is_empty() {
            return Err(WriteError::NothingToExport);
        }
        let mut out = create(destination)?;
        render(records, summary, &mut out)
            .and_then(|()| out.flush())
            .map_err(|e| io_error(destination, e))
    }
}

/// Renders the full report into `out`.
pub(crate) fn render(
    records: &[AnalysisRecord],
    summary: &BatchSummary,
    out: &mut impl Write,
) -> std::io::Result<()> {
    write_details(records, out)?;
    writeln!(out)?;
    write_summary(summary, out)
}

fn write_details(records: &[AnalysisRecord], out: &mut impl Write) -> std::io::Result<()> {
    // Every class seen anywhere in the batch gets a column pair, ordered by id
    let mut classes: BTreeMap<u32, &str> = BTreeMap::new();
    for metrics in records.iter().filter_map(AnalysisRecord::metrics) {
        for share in metrics.class_breakdown.iter() {
            classes.entry(share.class_id).or_insert(&share.name);
        }
    }

    let mut header = vec![
        "source".to_string(),
        "status".to_string(),
        "green_view_rate".to_string(),
        "vegetation_pixels".to_string(),
        "total_pixels".to_string(),
        "error".to_string(),
        "analyzed_at".to_string(),
        "artifact".to_string(),
    ];
    for name in classes.values() {
        header.push(escape_csv(&format!("{name}_pixels")));
        header.push(escape_csv(&format!("{name}_percentage")));
    }
    writeln!(out, "{}", header.join(","))?;

    for record in records {
        let mut row = vec![escape_csv(&record.source.to_string())];
        match record.metrics() {
            Some(m) => {
                row.push("success".to_string());
                row.push(format!("{:.2}", m.green_view_rate));
                row.push(m.vegetation_pixel_count.to_string());
                row.push(m.total_pixel_count.to_string());
                row.push(String::new());
            }
            None => {
                row.push("failed".to_string());
                row.push(String::new());
                row.push(String::new());
                row.push(String::new());
                row.push(escape_csv(record.failure_reason().unwrap_or_default()));
            }
        }
        row.push(escape_csv(&record.analyzed_at));
        row.push(
            record
                .artifact
                .as_ref()
                .map(|p| escape_csv(&p.display().to_string()))
                .unwrap_or_default(),
        );

        for &class_id in classes.keys() {
            let share = record
                .metrics()
                .and_then(|m| m.class_breakdown.iter().find(|s| s.class_id == class_id));
            match share {
                Some(s) => {
                    row.push(s.pixel_count.to_string());
                    row.push(format!("{:.2}", s.percentage));
                }
                None if record.is_success() => {
                    row.push("0".to_string());
                    row.push("0.00".to_string());
                }
                None => {
                    row.push(String::new());
                    row.push(String::new());
                }
            }
        }
        writeln!(out, "{}", row.join(","))?;
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn write_summary(summary: &BatchSummary, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "metric,value,unit")?;
    writeln!(out, "total_images,{},images", summary.total)?;
    writeln!(out, "successful_analyses,{},images", summary.succeeded)?;
    writeln!(out, "failed_analyses,{},images", summary.failed)?;
    writeln!(out, "success_rate,{:.2},%", summary.success_rate)?;

    if let Some(RateStats {
        mean,
        median,
        std_dev,
        min,
        max,
        q25,
        q75,
    }) = summary.rates
    {
        for (name, value) in [
            ("green_view_rate_mean", mean),
            ("green_view_rate_median", median),
            ("green_view_rate_std", std_dev),
            ("green_view_rate_min", min),
            ("green_view_rate_max", max),
            ("green_view_rate_q25", q25),
            ("green_view_rate_q75", q75),
        ] {
            writeln!(out, "{name},{value:.2},%")?;
        }
    }

    writeln!(out)?;
    writeln!(out, "green_view_level,images,share")?;
    for bucket in RateBucket::ALL {
        let count = summary.distribution.count(bucket);
        let share = if summary.succeeded > 0 {
            100.0 * count as f64 / summary.succeeded as f64
        } else {
            0.0
        };
        writeln!(out, "{},{count},{share:.1}%", bucket.range_label())?;
    }
    Ok(())
}

/// Escape special characters for CSV.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
