//! Summarize command - rebuild a report from previously exported records.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use greenview_adapters::{JsonDocument, ReportFormat};
use greenview_core::AnalysisRecord;
use serde::Deserialize;

use super::analyze::{parse_report_format, print_summary, write_report};
use super::ExitCode;

/// Arguments for the summarize command
#[derive(Args, Clone)]
pub struct SummarizeArgs {
    /// JSON export, or a JSON array of records
    pub records: PathBuf,

    /// Report file to write
    #[arg(long, value_name = "FILE")]
    pub report: PathBuf,

    /// Report format (default: from the report extension, else csv)
    #[arg(long, value_parser = parse_report_format)]
    pub report_format: Option<ReportFormat>,

    /// Pretty-print JSON reports
    #[arg(long)]
    pub pretty: bool,

    /// Suppress the summary on stderr
    #[arg(short, long)]
    pub quiet: bool,
}

/// Either shape written by greenview.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordsFile {
    Document(JsonDocument),
    Records(Vec<AnalysisRecord>),
}

/// Run the summarize command.
pub fn run(args: &SummarizeArgs) -> Result<ExitCode> {
    let records = read_records(&args.records)?;
    let summary = write_report(records, &args.report, args.report_format, args.pretty)?;

    if !args.quiet {
        print_summary(&summary);
    }
    Ok(ExitCode::Success)
}

fn read_records(path: &Path) -> Result<Vec<AnalysisRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: RecordsFile = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a greenview JSON export", path.display()))?;
    Ok(match file {
        RecordsFile::Document(doc) => doc.records,
        RecordsFile::Records(records) => records,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_read_plain_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let records = vec![AnalysisRecord::failed("a.jpg".into(), "unreadable")];
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        assert_eq!(read_records(&path).unwrap(), records);
    }

    #[test]
    fn test_read_rejects_other_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, r#"{"hello": "world"}"#).unwrap();

        let err = read_records(&path).unwrap_err();
        assert!(format!("{err:#}").contains("not a greenview JSON export"));
    }
}
