//! JSON output adapter.

use anyhow::Result;
use greenview_core::{ProgressEvent, ProgressSink};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// JSON output adapter writing to stdout or any writer.
pub struct JsonOutput {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonOutput {
    /// Creates a new JSON output writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Creates a new JSON output writing to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Writes one value as a single JSON line.
    #[allow(clippy::significant_drop_tightening)]
    pub fn write<T: Serialize>(&self, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writeln!(writer, "{json}")?;
        Ok(())
    }

    /// Writes a batch of values as a JSON array.
    #[allow(clippy::significant_drop_tightening)]
    pub fn write_array<T: Serialize>(&self, values: &[T], pretty: bool) -> Result<()> {
        let json = if pretty {
            serde_json::to_string_pretty(values)?
        } else {
            serde_json::to_string(values)?
        };
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writeln!(writer, "{json}")?;
        Ok(())
    }

    /// Flushes the underlying writer.
    #[allow(clippy::significant_drop_tightening)]
    pub fn flush(&self) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writer.flush()?;
        Ok(())
    }
}

/// Streams each finished record as a JSON line while a task runs.
pub struct RecordStream {
    output: Arc<JsonOutput>,
}

impl RecordStream {
    /// Streams into `output`.
    #[must_use]
    pub const fn new(output: Arc<JsonOutput>) -> Self {
        Self { output }
    }
}

impl ProgressSink for RecordStream {
    fn on_event(&self, event: ProgressEvent) {
        let result = match event {
            ProgressEvent::Analyzed { record, .. } => self.output.write(&record),
            ProgressEvent::Downloaded { record, .. } => self.output.write(&record),
            ProgressEvent::Finished { .. } => self.output.flush(),
            _ => Ok(()),
        };
        if let Err(e) = result {
            warn!("Failed to write record: {e:#}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use greenview_core::AnalysisRecord;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Shared {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_write_array_single_line_unless_pretty() {
        let buf = Shared::default();
        let output = JsonOutput::new(Box::new(buf.clone()));
        output.write_array(&[1, 2, 3], false).unwrap();
        assert_eq!(buf.text(), "[1,2,3]\n");

        let buf = Shared::default();
        let output = JsonOutput::new(Box::new(buf.clone()));
        output.write_array(&[1], true).unwrap();
        assert_eq!(buf.text(), "[\n  1\n]\n");
    }

    #[test]
    fn test_record_stream_writes_one_line_per_record() {
        let buf = Shared::default();
        let stream = RecordStream::new(Arc::new(JsonOutput::new(Box::new(buf.clone()))));

        for (index, name) in ["a.jpg", "b.jpg"].into_iter().enumerate() {
            stream.on_event(ProgressEvent::Analyzed {
                index,
                total: 2,
                record: AnalysisRecord::failed(name.into(), "unreadable"),
            });
        }

        let text = buf.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["source"], "a.jpg");
        assert_eq!(first["status"], "failed");
    }
}
