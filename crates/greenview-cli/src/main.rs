//! Greenview CLI - Green view rate analysis of street-level images.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::analyze::AnalyzeArgs;
use commands::{Cli, Commands, ExitCode};
use config::AppConfig;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load();

    let result = match cli.command {
        Some(Commands::Analyze(args)) => analyze(args, &config),
        Some(Commands::Coords(ref args)) => commands::coords::run(args, &config),
        Some(Commands::Fetch(ref args)) => commands::fetch::run(args, &config),
        Some(Commands::Summarize(ref args)) => commands::summarize::run(args),
        Some(Commands::Models(ref args)) => {
            commands::models::run(args, &config).map(|()| ExitCode::Success)
        }
        None => {
            // Default behavior: analyze with flattened args
            if cli.analyze.paths.is_empty() {
                eprintln!("error: No paths specified. Use --help for usage information.");
                return ExitCode::Error.into();
            }
            analyze(cli.analyze, &config)
        }
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::Error
        }
    };

    exit_code.into()
}

fn analyze(args: AnalyzeArgs, config: &AppConfig) -> Result<ExitCode> {
    let args = AnalyzeArgs::with_config(args, config);
    commands::analyze::run(&args)
}
