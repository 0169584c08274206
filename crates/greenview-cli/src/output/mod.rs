//! Output formatting for CLI.

mod json;
mod progress;

use std::sync::Arc;

use greenview_core::{ProgressEvent, ProgressSink};

pub use json::{JsonOutput, RecordStream};
pub use progress::ProgressBar;

/// Forwards every event to each inner sink, in order.
pub struct Fanout(Vec<Arc<dyn ProgressSink>>);

impl Fanout {
    /// Creates a fan-out over `sinks`.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn ProgressSink>>) -> Self {
        Self(sinks)
    }
}

impl ProgressSink for Fanout {
    fn on_event(&self, event: ProgressEvent) {
        for sink in &self.0 {
            sink.on_event(event.clone());
        }
    }
}
