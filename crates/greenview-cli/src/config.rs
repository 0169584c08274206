//! Configuration file support for greenview.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/greenview/config.toml` (lowest priority)
//! - Project-local: `.greenview.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use greenview_adapters::ReportFormat;
use greenview_core::domain::ClassNames;
use greenview_core::inference::DevicePreference;
use serde::Deserialize;
use tracing::{debug, info};

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General options.
    pub general: GeneralConfig,
    /// Compute device selection.
    pub device: DeviceConfig,
    /// Batch analysis settings.
    pub analysis: AnalysisConfig,
    /// Class id to name overrides, keyed by the id as a string.
    pub classes: BTreeMap<String, String>,
    /// Model settings.
    pub models: ModelsConfig,
    /// Output formatting settings.
    pub output: OutputConfig,
    /// Panorama download settings.
    pub fetch: FetchConfig,
}

/// General configuration options.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Recurse into subdirectories by default.
    pub recursive: Option<bool>,
}

/// Device configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// "auto", "cpu" or "accelerator".
    pub preferred: Option<String>,
}

/// Analysis configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Class id counted as vegetation.
    pub vegetation_class_id: Option<u32>,
    /// Images between cache reclamation passes.
    pub cleanup_cadence: Option<usize>,
    /// Resident memory (MiB) that triggers an extra reclamation; 0 disables.
    pub memory_threshold_mb: Option<u64>,
    /// Save a composite analysis image per successful item.
    pub save_artifacts: Option<bool>,
    /// Directory for composite images.
    pub artifacts_dir: Option<PathBuf>,
}

/// Model configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Custom models directory path.
    pub dir: Option<PathBuf>,
}

/// Output formatting configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Stdout format: "json" or "jsonl".
    pub format: Option<String>,
    /// Report file written after each analysis.
    pub report: Option<PathBuf>,
    /// Report format: "csv" or "json".
    pub report_format: Option<String>,
    /// Pretty-print JSON output.
    pub pretty: Option<bool>,
    /// Show progress bar.
    pub progress: Option<bool>,
}

/// Panorama download configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// API access key.
    pub ak: Option<String>,
    /// Image width in pixels.
    pub width: Option<u32>,
    /// Image height in pixels.
    pub height: Option<u32>,
    /// Field of view in degrees.
    pub fov: Option<u32>,
    /// Coordinate system of input locations.
    pub coordtype: Option<String>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/greenview/config.toml`
    /// 2. Project-local: `.greenview.toml` (searched up from cwd)
    ///
    /// Missing files are silently ignored. Invalid values are logged as warnings.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        if let Err(e) = config.validate() {
            eprintln!("warning: {e}");
        }

        config
    }

    /// Validate configuration values are within acceptable ranges.
    fn validate(&self) -> Result<(), String> {
        if let Some(ref d) = self.device.preferred {
            d.parse::<DevicePreference>()
                .map_err(|e| format!("device.preferred: {e}"))?;
        }

        if self.analysis.cleanup_cadence == Some(0) {
            return Err("analysis.cleanup_cadence must be at least 1, got 0".to_string());
        }

        if let Some(key) = self.classes.keys().find(|k| k.parse::<u32>().is_err()) {
            return Err(format!("classes keys must be numeric class ids, got '{key}'"));
        }

        if let Some(ref f) = self.output.format {
            if f != "json" && f != "jsonl" {
                return Err(format!("output.format must be 'json' or 'jsonl', got '{f}'"));
            }
        }
        if let Some(ref f) = self.output.report_format {
            f.parse::<ReportFormat>()
                .map_err(|e| format!("output.report_format: {e}"))?;
        }

        if let Some(w) = self.fetch.width {
            if !(10..=4096).contains(&w) {
                return Err(format!("fetch.width must be 10-4096, got {w}"));
            }
        }
        if let Some(h) = self.fetch.height {
            if !(10..=512).contains(&h) {
                return Err(format!("fetch.height must be 10-512, got {h}"));
            }
        }
        if let Some(f) = self.fetch.fov {
            if !(10..=360).contains(&f) {
                return Err(format!("fetch.fov must be 10-360, got {f}"));
            }
        }

        Ok(())
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        // General
        self.general.recursive = other.general.recursive.or(self.general.recursive);

        // Device
        self.device.preferred = other
            .device
            .preferred
            .or_else(|| self.device.preferred.take());

        // Analysis
        let a = other.analysis;
        self.analysis.vegetation_class_id =
            a.vegetation_class_id.or(self.analysis.vegetation_class_id);
        self.analysis.cleanup_cadence = a.cleanup_cadence.or(self.analysis.cleanup_cadence);
        self.analysis.memory_threshold_mb =
            a.memory_threshold_mb.or(self.analysis.memory_threshold_mb);
        self.analysis.save_artifacts = a.save_artifacts.or(self.analysis.save_artifacts);
        self.analysis.artifacts_dir = a
            .artifacts_dir
            .or_else(|| self.analysis.artifacts_dir.take());

        // Classes: entries merge key by key
        self.classes.extend(other.classes);

        // Models
        self.models.dir = other.models.dir.or_else(|| self.models.dir.take());

        // Output
        self.output.format = other.output.format.or_else(|| self.output.format.take());
        self.output.report = other.output.report.or_else(|| self.output.report.take());
        self.output.report_format = other
            .output
            .report_format
            .or_else(|| self.output.report_format.take());
        self.output.pretty = other.output.pretty.or(self.output.pretty);
        self.output.progress = other.output.progress.or(self.output.progress);

        // Fetch
        self.fetch.ak = other.fetch.ak.or_else(|| self.fetch.ak.take());
        self.fetch.width = other.fetch.width.or(self.fetch.width);
        self.fetch.height = other.fetch.height.or(self.fetch.height);
        self.fetch.fov = other.fetch.fov.or(self.fetch.fov);
        self.fetch.coordtype = other
            .fetch
            .coordtype
            .or_else(|| self.fetch.coordtype.take());
    }

    /// Applies `[classes]` overrides on top of `base`. Non-numeric keys are skipped.
    pub fn class_names(&self, mut base: ClassNames) -> ClassNames {
        for (key, name) in &self.classes {
            if let Ok(id) = key.parse::<u32>() {
                base.insert(id, name.clone());
            }
        }
        base
    }
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("greenview").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.greenview.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let config_path = dir.join(".greenview.toml");
        if config_path.exists() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    None
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.analysis.cleanup_cadence.is_none());
        assert!(config.device.preferred.is_none());
        assert!(config.classes.is_empty());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: AppConfig = toml::from_str("").expect("parse empty config");
        assert!(config.analysis.save_artifacts.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[general]
recursive = true

[device]
preferred = "cpu"

[analysis]
vegetation_class_id = 8
cleanup_cadence = 10
memory_threshold_mb = 2048
save_artifacts = true
artifacts_dir = "out/analysis"

[classes]
"8" = "trees"
"9" = "grass"

[models]
dir = "/opt/models"

[output]
format = 'json'
report = "report.csv"
report_format = "csv"
pretty = true
progress = false

[fetch]
ak = "secret"
width = 2048
height = 256
fov = 90
coordtype = "bd09ll"
"#;
        let config: AppConfig = toml::from_str(toml).expect("parse full config");

        assert_eq!(config.general.recursive, Some(true));
        assert_eq!(config.device.preferred.as_deref(), Some("cpu"));
        assert_eq!(config.analysis.cleanup_cadence, Some(10));
        assert_eq!(config.analysis.memory_threshold_mb, Some(2048));
        assert_eq!(config.analysis.artifacts_dir, Some(PathBuf::from("out/analysis")));
        assert_eq!(config.classes.get("9").map(String::as_str), Some("grass"));
        assert_eq!(config.output.report, Some(PathBuf::from("report.csv")));
        assert_eq!(config.fetch.width, Some(2048));
        assert_eq!(config.fetch.coordtype.as_deref(), Some("bd09ll"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_configs() {
        let mut base: AppConfig = toml::from_str(
            r"
[analysis]
cleanup_cadence = 5
memory_threshold_mb = 1000

[classes]
'8' = 'vegetation'
'10' = 'sky'
",
        )
        .expect("parse base");

        let override_config: AppConfig = toml::from_str(
            r"
[analysis]
cleanup_cadence = 20

[classes]
'8' = 'greenery'

[fetch]
fov = 120
",
        )
        .expect("parse override");

        base.merge(override_config);

        assert_eq!(base.analysis.cleanup_cadence, Some(20));
        assert_eq!(base.analysis.memory_threshold_mb, Some(1000));
        assert_eq!(base.classes.get("8").map(String::as_str), Some("greenery"));
        assert_eq!(base.classes.get("10").map(String::as_str), Some("sky"));
        assert_eq!(base.fetch.fov, Some(120));
    }

    #[test]
    fn test_merge_empty_override_preserves_base() {
        let mut base: AppConfig = toml::from_str(
            r"
[device]
preferred = 'accelerator'

[output]
report = 'a.csv'
",
        )
        .expect("parse base");

        base.merge(AppConfig::default());

        assert_eq!(base.device.preferred.as_deref(), Some("accelerator"));
        assert_eq!(base.output.report, Some(PathBuf::from("a.csv")));
    }

    #[test]
    fn test_merge_empty_base_accepts_override() {
        let mut base = AppConfig::default();
        let override_config: AppConfig = toml::from_str(
            r"
[general]
recursive = true
",
        )
        .expect("parse override");

        base.merge(override_config);
        assert_eq!(base.general.recursive, Some(true));
    }

    #[test]
    fn test_class_names_overlay() {
        let config: AppConfig = toml::from_str(
            r"
[classes]
'8' = 'trees'
'42' = 'custom'
",
        )
        .expect("parse classes");

        let names = config.class_names(ClassNames::cityscapes());
        assert_eq!(names.name(8), "trees");
        assert_eq!(names.name(42), "custom");
        assert_eq!(names.name(10), "sky");
    }

    #[test]
    fn test_invalid_toml_syntax_handled() {
        let toml = r"
[analysis
cleanup_cadence = 5
";
        let result: Result<AppConfig, _> = toml::from_str(toml);
        assert!(result.is_err(), "invalid TOML should return error");
    }

    #[test]
    fn test_invalid_field_type_handled() {
        let toml = r#"
[analysis]
cleanup_cadence = "often"
"#;
        let result: Result<AppConfig, _> = toml::from_str(toml);
        assert!(result.is_err(), "type mismatch should return error");
    }

    #[test]
    fn test_validate_cadence_zero() {
        let mut config = AppConfig::default();
        config.analysis.cleanup_cadence = Some(0);
        assert!(config.validate().unwrap_err().contains("cleanup_cadence"));
    }

    #[test]
    fn test_validate_device() {
        let mut config = AppConfig::default();
        config.device.preferred = Some("tpu".to_string());
        assert!(config.validate().unwrap_err().contains("device.preferred"));
    }

    #[test]
    fn test_validate_class_keys() {
        let mut config = AppConfig::default();
        config.classes.insert("trees".to_string(), "x".to_string());
        assert!(config.validate().unwrap_err().contains("'trees'"));
    }

    #[test]
    fn test_validate_output_formats() {
        let mut config = AppConfig::default();
        config.output.format = Some("xml".to_string());
        assert!(config.validate().unwrap_err().contains("output.format"));

        let mut config = AppConfig::default();
        config.output.report_format = Some("xlsx".to_string());
        assert!(config.validate().unwrap_err().contains("output.report_format"));
    }

    #[test]
    fn test_validate_fetch_ranges() {
        let mut config = AppConfig::default();
        config.fetch.width = Some(5000);
        assert!(config.validate().unwrap_err().contains("fetch.width"));

        let mut config = AppConfig::default();
        config.fetch.height = Some(1024);
        assert!(config.validate().unwrap_err().contains("fetch.height"));
    }

    #[test]
    fn test_validate_empty_config_passes() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_find_config_in_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".greenview.toml"), "").unwrap();

        let found = find_config_in_parents(&nested).unwrap();
        assert_eq!(found, dir.path().join(".greenview.toml"));
    }
}
