//! Report writers: CSV and JSON renderings of a batch.

mod csv;
mod json;

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;

use greenview_core::{ReportWriter, WriteError};

pub use self::csv::CsvReport;
pub use self::json::{JsonDocument, JsonReport};

/// Report file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Detail and summary tables in one CSV file.
    #[default]
    Csv,
    /// `{records, summary, exported_at}` document.
    Json,
}

impl ReportFormat {
    /// Infers the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }

    /// A writer for this format.
    #[must_use]
    pub fn writer(self, pretty: bool) -> Box<dyn ReportWriter> {
        match self {
            Self::Csv => Box::new(CsvReport),
            Self::Json => Box::new(JsonReport::new(pretty)),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown report format '{other}' (expected csv or json)")),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Csv => "csv",
            Self::Json => "json",
        })
    }
}

fn create(destination: &Path) -> Result<BufWriter<File>, WriteError> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    File::create(destination)
        .map(BufWriter::new)
        .map_err(|e| io_error(destination, e))
}

fn io_error(path: &Path, source: std::io::Error) -> WriteError {
    WriteError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(ReportFormat::from_path(Path::new("out.csv")), Some(ReportFormat::Csv));
        assert_eq!(ReportFormat::from_path(Path::new("OUT.JSON")), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_path(Path::new("out.xlsx")), None);
        assert_eq!(ReportFormat::from_path(Path::new("out")), None);
    }

    #[test]
    fn test_format_parse_error() {
        let err = "xml".parse::<ReportFormat>().err().unwrap_or_default();
        assert!(err.contains("xml"));
    }
}
