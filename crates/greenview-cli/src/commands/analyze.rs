//! Analyze command - compute the green view rate of images.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use greenview_adapters::models::set_models_dir;
use greenview_adapters::{
    collect_images, model_files, FsArtifactStore, FsImageLoader, ReportFormat, SysinfoProbe,
};
use greenview_core::domain::{ClassNames, VEGETATION_CLASS_ID};
use greenview_core::inference::{DevicePreference, SegFormerEngine};
use greenview_core::pipeline::defaults as pipeline_defaults;
use greenview_core::ports::NullProgress;
use greenview_core::tasks::{worker, AnalyzeTask, ExportTask};
use greenview_core::{
    AnalysisRecord, ArtifactStore, BatchSummary, LoadError, PipelineSettings, ProgressSink,
};
use tracing::{debug, info, warn};

use super::ExitCode;
use crate::config::AppConfig;
use crate::output::{Fanout, JsonOutput, ProgressBar, RecordStream};

/// Output format for records on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON Lines (one JSON object per line)
    #[default]
    Jsonl,
    /// Single JSON array
    Json,
}

/// Hardcoded default values.
mod defaults {
    pub const ARTIFACTS_DIR: &str = "analysis";
}

/// Parse a compute device name.
fn parse_device(s: &str) -> Result<DevicePreference, String> {
    s.parse()
}

/// Parse and validate a cleanup cadence (at least 1).
fn parse_cadence(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value >= 1 {
        Ok(value)
    } else {
        Err(format!("{value} is not in 1.."))
    }
}

/// Parse a report format name.
pub(crate) fn parse_report_format(s: &str) -> Result<ReportFormat, String> {
    s.parse()
}

/// Shared arguments for image analysis.
#[derive(Args, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct AnalyzeArgs {
    /// Files or directories to analyze
    pub paths: Vec<PathBuf>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Compute device: auto, cpu or accelerator
    #[arg(long, value_parser = parse_device)]
    pub device: Option<DevicePreference>,

    /// Images between cache reclamation passes (at least 1)
    #[arg(long, value_parser = parse_cadence)]
    pub cadence: Option<usize>,

    /// Resident memory in MiB that triggers an extra reclamation (0 disables)
    #[arg(long, value_name = "MIB")]
    pub memory_threshold_mb: Option<u64>,

    /// Class id counted as vegetation
    #[arg(long, value_name = "ID")]
    pub vegetation_class: Option<u32>,

    /// Save a composite analysis image per successful item
    #[arg(long)]
    pub save_artifacts: bool,

    /// Directory for composite analysis images
    #[arg(long, value_name = "DIR")]
    pub artifacts_dir: Option<PathBuf>,

    /// Write a report file after the run
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Report format (default: from the report extension, else csv)
    #[arg(long, value_parser = parse_report_format)]
    pub report_format: Option<ReportFormat>,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format for records on stdout
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Pretty-print JSON output (affects --format json and JSON reports)
    #[arg(long)]
    pub pretty: bool,

    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: Option<AppConfig>,
}

impl AnalyzeArgs {
    /// Apply configuration file values, respecting CLI precedence.
    ///
    /// Layering priority (lowest to highest):
    /// 1. Hardcoded defaults (in accessor methods)
    /// 2. Config file values (XDG, then project-local)
    /// 3. CLI arguments (already set on self)
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        if !args.recursive {
            args.recursive = config.general.recursive.unwrap_or(false);
        }

        // Invalid config values were already reported by `validate`
        if args.device.is_none() {
            args.device = config
                .device
                .preferred
                .as_deref()
                .and_then(|s| s.parse().ok());
        }

        args.cadence = args
            .cadence
            .or(config.analysis.cleanup_cadence.filter(|&c| c >= 1));
        args.memory_threshold_mb = args
            .memory_threshold_mb
            .or(config.analysis.memory_threshold_mb);
        args.vegetation_class = args
            .vegetation_class
            .or(config.analysis.vegetation_class_id);

        if !args.save_artifacts {
            args.save_artifacts = config.analysis.save_artifacts.unwrap_or(false);
        }
        if args.artifacts_dir.is_none() {
            args.artifacts_dir.clone_from(&config.analysis.artifacts_dir);
        }

        if args.report.is_none() {
            args.report.clone_from(&config.output.report);
        }
        if args.report_format.is_none() {
            args.report_format = config
                .output
                .report_format
                .as_deref()
                .and_then(|s| s.parse().ok());
        }

        if args.format.is_none() {
            args.format = config
                .output
                .format
                .as_ref()
                .and_then(|s| match s.as_str() {
                    "json" => Some(OutputFormat::Json),
                    "jsonl" => Some(OutputFormat::Jsonl),
                    _ => None,
                });
        }

        if !args.pretty {
            args.pretty = config.output.pretty.unwrap_or(false);
        }
        if !args.progress {
            args.progress = config.output.progress.unwrap_or(false);
        }

        if args.models_dir.is_none() {
            args.models_dir.clone_from(&config.models.dir);
        }

        // Kept for the class table overrides
        args.config = Some(config.clone());

        args
    }

    fn device(&self) -> DevicePreference {
        self.device.unwrap_or_default()
    }

    fn format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }

    fn memory_threshold_bytes(&self) -> Option<u64> {
        match self.memory_threshold_mb {
            Some(0) => None,
            Some(mb) => Some(mb.saturating_mul(1024 * 1024)),
            None => Some(pipeline_defaults::MEMORY_THRESHOLD_BYTES),
        }
    }

    fn artifacts_dir(&self) -> PathBuf {
        self.artifacts_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::ARTIFACTS_DIR))
    }

    /// Class table: checkpoint names (or Cityscapes) overlaid with config.
    fn class_names(&self, from_checkpoint: Option<ClassNames>) -> ClassNames {
        let base = from_checkpoint.unwrap_or_else(ClassNames::cityscapes);
        match &self.config {
            Some(config) => config.class_names(base),
            None => base,
        }
    }
}

/// Run the analyze command.
///
/// Expects `args` to have been processed through `with_config()` first
/// to apply configuration file settings.
pub fn run(args: &AnalyzeArgs) -> Result<ExitCode> {
    info!("Running analyze command on {} paths", args.paths.len());

    if args.paths.is_empty() {
        anyhow::bail!("No paths specified");
    }

    if let Some(ref models_dir) = args.models_dir {
        debug!("Using custom models directory: {}", models_dir.display());
        set_models_dir(models_dir.clone());
    }

    let images = collect_images(&args.paths, args.recursive);
    if images.is_empty() {
        warn!("No images found");
        return Ok(ExitCode::Success);
    }

    let mut engine = SegFormerEngine::new(model_files());
    let ready = engine.load(args.device()).map_err(|e| match e {
        LoadError::MissingArtifact(path) => anyhow::anyhow!(
            "{} not found. Run `greenview models fetch` first.",
            path.display()
        ),
        other => anyhow::Error::new(other).context("Failed to load segmentation model"),
    })?;
    info!("Segmentation engine ready on {}", ready.device);

    let settings = PipelineSettings {
        vegetation_class_id: args.vegetation_class.unwrap_or(VEGETATION_CLASS_ID),
        class_names: args.class_names(ready.class_names),
        cleanup_cadence: args.cadence.unwrap_or(pipeline_defaults::CLEANUP_CADENCE),
        memory_threshold_bytes: args.memory_threshold_bytes(),
        save_artifacts: args.save_artifacts,
    };
    let artifacts = args.save_artifacts.then(|| {
        Arc::new(FsArtifactStore::new(args.artifacts_dir())) as Arc<dyn ArtifactStore>
    });

    let show_progress = !args.quiet && (args.progress || std::io::stderr().is_terminal());
    let progress_bar = ProgressBar::new(Some(images.len() as u64), args.quiet, show_progress);
    let output = Arc::new(JsonOutput::stdout());

    let mut sinks: Vec<Arc<dyn ProgressSink>> = vec![Arc::new(progress_bar)];
    if args.format() == OutputFormat::Jsonl {
        sinks.push(Arc::new(RecordStream::new(Arc::clone(&output))));
    }

    let task = AnalyzeTask {
        images,
        segmenter: Box::new(engine),
        settings,
        loader: Arc::new(FsImageLoader),
        memory: Arc::new(SysinfoProbe::new()),
        artifacts,
    };
    let analyzed = worker::spawn(task, Arc::new(Fanout::new(sinks)))?.join()?;
    let records = analyzed.outcome.records;

    if args.format() == OutputFormat::Json {
        output.write_array(&records, args.pretty)?;
    }
    output.flush()?;

    if let Some(ref destination) = args.report {
        write_report(records, destination, args.report_format, args.pretty)?;
    }

    if !args.quiet {
        print_summary(&analyzed.summary);
    }

    Ok(ExitCode::from_failures(analyzed.summary.failed))
}

/// Writes `records` to `destination` on the export worker.
///
/// The format is `format` if given, else inferred from the extension, else CSV.
pub(crate) fn write_report(
    records: Vec<AnalysisRecord>,
    destination: &Path,
    format: Option<ReportFormat>,
    pretty: bool,
) -> Result<BatchSummary> {
    let format = format
        .or_else(|| ReportFormat::from_path(destination))
        .unwrap_or_default();
    debug!("Writing {format} report to {}", destination.display());

    let task = ExportTask {
        records,
        destination: destination.to_path_buf(),
        writer: format.writer(pretty),
    };
    let exported = worker::spawn(task, Arc::new(NullProgress))?
        .join()
        .with_context(|| format!("Failed to write report {}", destination.display()))?;

    if let Some(path) = exported.destination {
        info!("Report written to {}", path.display());
    }
    Ok(exported.summary)
}

/// Prints a short human-readable summary to stderr.
pub(crate) fn print_summary(summary: &BatchSummary) {
    eprintln!(
        "{} images: {} succeeded, {} failed ({:.1}% success)",
        summary.total, summary.succeeded, summary.failed, summary.success_rate
    );
    if let Some(stats) = summary.rates {
        eprintln!(
            "green view rate: mean {:.2}%, median {:.2}%, min {:.2}%, max {:.2}%",
            stats.mean, stats.median, stats.min, stats.max
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: AnalyzeArgs,
    }

    fn parse(argv: &[&str]) -> AnalyzeArgs {
        Harness::try_parse_from(std::iter::once("greenview").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    fn config(toml: &str) -> AppConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_parse_cadence() {
        assert_eq!(parse_cadence("5"), Ok(5));
        assert!(parse_cadence("0").is_err());
        assert!(parse_cadence("often").is_err());
    }

    #[test]
    fn test_config_fills_unset_flags() {
        let cfg = config(
            r"
[device]
preferred = 'cpu'

[analysis]
cleanup_cadence = 8
vegetation_class_id = 9

[output]
format = 'json'
report = 'out.csv'
",
        );
        let args = AnalyzeArgs::with_config(parse(&["img.jpg"]), &cfg);

        assert_eq!(args.device(), DevicePreference::ForceCpu);
        assert_eq!(args.cadence, Some(8));
        assert_eq!(args.vegetation_class, Some(9));
        assert_eq!(args.format(), OutputFormat::Json);
        assert_eq!(args.report, Some(PathBuf::from("out.csv")));
    }

    #[test]
    fn test_cli_flags_beat_config() {
        let cfg = config(
            r"
[device]
preferred = 'cpu'

[analysis]
cleanup_cadence = 8

[output]
format = 'json'
",
        );
        let args = AnalyzeArgs::with_config(
            parse(&["--device", "auto", "--cadence", "2", "--format", "jsonl", "img.jpg"]),
            &cfg,
        );

        assert_eq!(args.device(), DevicePreference::Auto);
        assert_eq!(args.cadence, Some(2));
        assert_eq!(args.format(), OutputFormat::Jsonl);
    }

    #[test]
    fn test_memory_threshold_zero_disables() {
        let args = parse(&["--memory-threshold-mb", "0", "img.jpg"]);
        assert_eq!(args.memory_threshold_bytes(), None);

        let args = parse(&["--memory-threshold-mb", "2", "img.jpg"]);
        assert_eq!(args.memory_threshold_bytes(), Some(2 * 1024 * 1024));

        let args = parse(&["img.jpg"]);
        assert_eq!(
            args.memory_threshold_bytes(),
            Some(pipeline_defaults::MEMORY_THRESHOLD_BYTES)
        );
    }

    #[test]
    fn test_default_memory_threshold_is_one_gib() {
        assert_eq!(pipeline_defaults::MEMORY_THRESHOLD_BYTES, 1024 * 1024 * 1024);
        let cfg = config("[analysis]\nmemory_threshold_mb = 1024\n");
        let args = AnalyzeArgs::with_config(parse(&["img.jpg"]), &cfg);
        assert_eq!(
            args.memory_threshold_bytes(),
            Some(pipeline_defaults::MEMORY_THRESHOLD_BYTES)
        );
    }

    #[test]
    fn test_class_names_overlay_config() {
        let cfg = config("[classes]\n'8' = 'trees'\n");
        let args = AnalyzeArgs::with_config(parse(&["img.jpg"]), &cfg);

        let names = args.class_names(None);
        assert_eq!(names.name(8), "trees");
        assert_eq!(names.name(0), "road");
    }

    #[test]
    fn test_artifacts_dir_default() {
        let args = parse(&["img.jpg"]);
        assert_eq!(args.artifacts_dir(), PathBuf::from("analysis"));
    }
}
