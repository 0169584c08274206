//! CLI command definitions and handlers.

pub mod analyze;
pub mod coords;
pub mod fetch;
pub mod models;
pub mod summarize;

use clap::{Parser, Subcommand};

/// Greenview - Green view rate analysis of street-level images
#[derive(Parser)]
#[command(name = "greenview")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Shared analyze arguments (paths, engine and output flags).
    #[command(flatten)]
    pub analyze: analyze::AnalyzeArgs,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Compute the green view rate of images
    Analyze(analyze::AnalyzeArgs),
    /// Collect sample locations from a place search
    Coords(coords::CoordsArgs),
    /// Download street-level panoramas for a list of locations
    Fetch(fetch::FetchArgs),
    /// Rebuild a report from a previous JSON export
    Summarize(summarize::SummarizeArgs),
    /// Manage segmentation models
    Models(models::ModelsArgs),
}

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Every item succeeded.
    Success,
    /// At least one item failed.
    ItemsFailed,
    /// The command could not run.
    Error,
}

impl ExitCode {
    /// `ItemsFailed` when `failed > 0`, else `Success`.
    #[must_use]
    pub const fn from_failures(failed: usize) -> Self {
        if failed > 0 {
            Self::ItemsFailed
        } else {
            Self::Success
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        match code {
            ExitCode::Success => Self::SUCCESS,
            ExitCode::ItemsFailed => Self::from(1),
            ExitCode::Error => Self::from(2),
        }
    }
}
