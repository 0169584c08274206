//! Report materialization port.

use std::path::Path;

use crate::domain::{AnalysisRecord, BatchSummary};
use crate::error::WriteError;

/// Port for rendering records and their summary into a durable artifact.
pub trait ReportWriter: Send + Sync {
    /// Writes `records` and `summary` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::NothingToExport`] for an empty record set, or
    /// another [`WriteError`] if the destination cannot be written.
    fn write(
        &self,
        records: &[AnalysisRecord],
        summary: &BatchSummary,
        destination: &Path,
    ) -> Result<(), WriteError>;
}
