//! Progress bar adapter using indicatif.

use greenview_core::domain::DownloadOutcome;
use greenview_core::ports::TaskKind;
use greenview_core::{ItemOutcome, ProgressEvent, ProgressSink};
use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};
use tracing::debug;

/// Progress bar adapter for CLI output.
pub struct ProgressBar {
    bar: Option<IndicatifBar>,
    quiet: bool,
}

impl ProgressBar {
    /// Creates a new progress bar.
    ///
    /// # Arguments
    ///
    /// * `total` - Total number of items, if known
    /// * `quiet` - If true, suppress all output
    /// * `show_bar` - If true, show progress bar; otherwise show per-item status
    #[must_use]
    pub fn new(total: Option<u64>, quiet: bool, show_bar: bool) -> Self {
        if quiet {
            return Self {
                bar: None,
                quiet: true,
            };
        }

        let bar = if show_bar {
            let bar = total.map_or_else(IndicatifBar::new_spinner, IndicatifBar::new);

            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }

            Some(bar)
        } else {
            None
        };

        Self { bar, quiet }
    }
}

impl ProgressSink for ProgressBar {
    fn on_event(&self, event: ProgressEvent) {
        if self.quiet {
            return;
        }

        match event {
            ProgressEvent::Started { total, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_length(total as u64);
                    bar.set_position(0);
                }
            }
            ProgressEvent::Analyzed { record, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_message(record.source.stem());
                    bar.inc(1);
                } else {
                    match &record.outcome {
                        ItemOutcome::Success(m) => {
                            eprintln!("{}: {:.2}%", record.source, m.green_view_rate);
                        }
                        ItemOutcome::Failed { reason } => {
                            eprintln!("WARN: {}: {reason}", record.source);
                        }
                    }
                }
            }
            ProgressEvent::Downloaded { record, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_message(record.location.to_string());
                    bar.inc(1);
                } else {
                    match &record.outcome {
                        DownloadOutcome::Saved(img) => {
                            eprintln!("{}: {}", record.location, img.path.display());
                        }
                        DownloadOutcome::Failed { reason } => {
                            eprintln!("WARN: {}: {reason}", record.location);
                        }
                    }
                }
            }
            ProgressEvent::Reclaimed {
                after_items,
                reason,
                resident_before,
                resident_after,
            } => {
                debug!(
                    "Reclaimed after {after_items} items ({reason:?}): {resident_before:?} -> {resident_after:?} bytes"
                );
            }
            ProgressEvent::Finished {
                kind,
                succeeded,
                failed,
                cancelled,
            } => {
                if let Some(bar) = &self.bar {
                    let verb = match kind {
                        TaskKind::Download => "downloaded",
                        TaskKind::Analyze => "analyzed",
                        TaskKind::Export => "exported",
                    };
                    let suffix = if cancelled { " (cancelled)" } else { "" };
                    bar.finish_with_message(format!(
                        "Done: {succeeded} {verb}, {failed} failed{suffix}"
                    ));
                }
            }
            ProgressEvent::Failed { kind, message } => {
                if let Some(bar) = &self.bar {
                    bar.abandon_with_message(format!("{kind} failed: {message}"));
                }
            }
        }
    }
}
