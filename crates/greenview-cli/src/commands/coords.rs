//! Coords command - collect sample locations from a place search.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use greenview_adapters::places::{defaults as place_defaults, BaiduPlaceSearch};
use greenview_core::domain::{format_locations, Place};
use greenview_core::places::{collect_places, CollectRequest};
use tracing::info;

use super::ExitCode;
use crate::config::AppConfig;
use crate::output::JsonOutput;

/// Arguments for the coords command
#[derive(Args, Clone)]
pub struct CoordsArgs {
    /// City or province to search in (repeatable)
    #[arg(long, value_name = "NAME", required = true)]
    pub region: Vec<String>,

    /// Place type to search for, e.g. `学校` or `school` (repeatable)
    #[arg(long = "poi-type", value_name = "TYPE", required = true)]
    pub poi_type: Vec<String>,

    /// Extra keyword combined with each place type (repeatable)
    #[arg(long, value_name = "WORD")]
    pub keyword: Vec<String>,

    /// Coordinate list written for `greenview fetch --coords`
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// API access key (overrides config)
    #[arg(long, value_name = "KEY")]
    pub ak: Option<String>,

    /// Pages requested per query at most
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_pages: Option<u32>,

    /// Pretty-print the place list on stdout
    #[arg(long)]
    pub pretty: bool,

    /// Suppress the summary line
    #[arg(short, long)]
    pub quiet: bool,
}

impl CoordsArgs {
    fn request(&self) -> CollectRequest {
        let mut request = CollectRequest::new(self.region.clone(), self.poi_type.clone());
        request.keywords.clone_from(&self.keyword);
        if let Some(max_pages) = self.max_pages {
            request.max_pages = max_pages;
        }
        request
    }
}

/// Run the coords command.
pub fn run(args: &CoordsArgs, config: &AppConfig) -> Result<ExitCode> {
    let ak = args
        .ak
        .clone()
        .or_else(|| config.fetch.ak.clone())
        .context("No API key. Pass --ak or set [fetch] ak in the config file.")?;

    let request = args.request();
    info!(
        "Searching {} regions for {} place types",
        request.regions.len(),
        request.poi_types.len()
    );
    let search = BaiduPlaceSearch::new(ak)?;
    let places = collect_places(&search, &request)?;
    if places.is_empty() {
        anyhow::bail!("No places found for the given regions and types");
    }

    write_coordinate_list(&args.out, &places)?;

    let output = JsonOutput::stdout();
    output.write_array(&places, args.pretty)?;
    output.flush()?;

    if !args.quiet {
        eprintln!(
            "{} places written to {} ({} coordinates; set [fetch] coordtype = '{}' before fetching)",
            places.len(),
            args.out.display(),
            place_defaults::COORDTYPE,
            place_defaults::COORDTYPE
        );
    }
    Ok(ExitCode::Success)
}

/// Writes `places` as a commented `lng,lat` list, creating parent directories.
fn write_coordinate_list(path: &Path, places: &[Place]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let text = format!(
        "# {} places, coordtype {}\n{}",
        places.len(),
        place_defaults::COORDTYPE,
        format_locations(places)
    );
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;
    use greenview_core::domain::{parse_locations, GeoPoint};

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: CoordsArgs,
    }

    fn parse(argv: &[&str]) -> CoordsArgs {
        TestCli::parse_from(std::iter::once("coords").chain(argv.iter().copied())).args
    }

    #[test]
    fn test_request_from_args() {
        let args = parse(&[
            "--region", "北京市", "--region", "上海市", "--poi-type", "公园", "--keyword", "东",
            "--max-pages", "2", "--out", "points.txt",
        ]);
        let request = args.request();
        assert_eq!(request.regions, vec!["北京市", "上海市"]);
        assert_eq!(request.poi_types, vec!["公园"]);
        assert_eq!(request.keywords, vec!["东"]);
        assert_eq!(request.max_pages, 2);
        assert_eq!(request.queries().len(), 4);
    }

    #[test]
    fn test_default_max_pages() {
        let args = parse(&["--region", "x", "--poi-type", "school", "--out", "p.txt"]);
        assert_eq!(args.request().max_pages, 10);
    }

    #[test]
    fn test_coordinate_list_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/points.txt");
        let places = vec![Place {
            name: "景山公园".into(),
            address: "景山西街44号".into(),
            location: GeoPoint::new(116.403, 39.931).unwrap(),
            region: "北京市".into(),
            uid: String::new(),
        }];
        write_coordinate_list(&path, &places).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# 1 places, coordtype bd09ll\n"));
        assert_eq!(parse_locations(&text), vec![places[0].location]);
    }
}
