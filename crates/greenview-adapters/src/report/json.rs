//! JSON report.

use std::io::Write;
use std::path::Path;

use greenview_core::domain::timestamp_now;
use greenview_core::{AnalysisRecord, BatchSummary, ReportWriter, WriteError};
use serde::{Deserialize, Serialize};

use super::{create, io_error};

/// On-disk shape of a JSON report; also read back by `summarize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDocument {
    /// Records in batch order.
    pub records: Vec<AnalysisRecord>,
    /// Summary over `records`.
    pub summary: BatchSummary,
    /// RFC 3339 export time.
    pub exported_at: String,
}

/// Writes `{records, summary, exported_at}`.
#[derive(Debug, Clone, Copy)]
pub struct JsonReport {
    pretty: bool,
}

impl JsonReport {
    /// Creates a writer; `pretty` indents the output.
    #[must_use]
    pub const fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl Default for JsonReport {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ReportWriter for JsonReport {
    fn write(
        &self,
        records: &[AnalysisRecord],
        summary: &BatchSummary,
        destination: &Path,
    ) -> Result<(), WriteError> {
        if records.is_empty() {
            return Err(WriteError::NothingToExport);
        }
        let doc = JsonDocument {
            records: records.to_vec(),
            summary: summary.clone(),
            exported_at: timestamp_now(),
        };

        let mut out = create(destination)?;
        let result = if self.pretty {
            serde_json::to_writer_pretty(&mut out, &doc)
        } else {
            serde_json::to_writer(&mut out, &doc)
        };
        result.map_err(|e| WriteError::Serialize(e.to_string()))?;
        writeln!(out)
            .and_then(|()| out.flush())
            .map_err(|e| io_error(destination, e))
    }
}
