//! Fetch command - download street-level panoramas for a list of locations.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use greenview_adapters::{PanoramaFetcher, PanoramaParams};
use greenview_core::domain::parse_locations;
use greenview_core::tasks::{worker, DownloadTask};
use greenview_core::ProgressSink;
use tracing::info;

use super::ExitCode;
use crate::config::AppConfig;
use crate::output::{Fanout, JsonOutput, ProgressBar, RecordStream};

/// Arguments for the fetch command
#[derive(Args, Clone)]
pub struct FetchArgs {
    /// Text file with one `lng,lat` pair per line
    #[arg(long, value_name = "FILE")]
    pub coords: PathBuf,

    /// Directory the images are saved into
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,

    /// API access key (overrides config)
    #[arg(long, value_name = "KEY")]
    pub ak: Option<String>,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Run the fetch command.
pub fn run(args: &FetchArgs, config: &AppConfig) -> Result<ExitCode> {
    let text = std::fs::read_to_string(&args.coords)
        .with_context(|| format!("Failed to read {}", args.coords.display()))?;
    let locations = parse_locations(&text);
    if locations.is_empty() {
        anyhow::bail!("No valid coordinates in {}", args.coords.display());
    }

    let ak = args
        .ak
        .clone()
        .or_else(|| config.fetch.ak.clone())
        .context("No API key. Pass --ak or set [fetch] ak in the config file.")?;
    let params = params(ak, config);
    info!(
        "Fetching {} panoramas ({}x{}, fov {})",
        locations.len(),
        params.width,
        params.height,
        params.fov
    );

    let show_progress = !args.quiet && (args.progress || std::io::stderr().is_terminal());
    let progress_bar = ProgressBar::new(Some(locations.len() as u64), args.quiet, show_progress);
    let output = Arc::new(JsonOutput::stdout());
    let sinks: Vec<Arc<dyn ProgressSink>> = vec![
        Arc::new(progress_bar),
        Arc::new(RecordStream::new(Arc::clone(&output))),
    ];

    let task = DownloadTask {
        locations,
        save_dir: args.out.clone(),
        fetcher: Box::new(PanoramaFetcher::new(params)?),
    };
    let downloaded = worker::spawn(task, Arc::new(Fanout::new(sinks)))?.join()?;

    let saved = downloaded.saved_images().len();
    let failed = downloaded.records.len() - saved;
    if !args.quiet {
        eprintln!(
            "{} locations: {saved} saved to {}, {failed} failed",
            downloaded.records.len(),
            args.out.display()
        );
    }

    Ok(ExitCode::from_failures(failed))
}

fn params(ak: String, config: &AppConfig) -> PanoramaParams {
    let mut params = PanoramaParams::new(ak);
    if let Some(width) = config.fetch.width {
        params.width = width;
    }
    if let Some(height) = config.fetch.height {
        params.height = height;
    }
    if let Some(fov) = config.fetch.fov {
        params.fov = fov;
    }
    if let Some(ref coordtype) = config.fetch.coordtype {
        params.coordtype.clone_from(coordtype);
    }
    params.clamped()
}
