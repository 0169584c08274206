//! Integration tests for configuration layering.
//!
//! Tests the full priority chain: hardcoded defaults < XDG config < project config < CLI args

#![allow(clippy::unwrap_used)] // Test code uses unwrap for brevity
#![allow(deprecated)] // cargo_bin deprecation warning

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn greenview(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("greenview").unwrap();
    cmd.current_dir(home.join("project"))
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"));
    cmd
}

fn home() -> tempfile::TempDir {
    let home = tempfile::tempdir().unwrap();
    fs::create_dir_all(home.path().join("project")).unwrap();
    home
}

fn write_xdg_config(home: &Path, content: &str) {
    let dir = home.join("config/greenview");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), content).unwrap();
}

fn write_project_config(home: &Path, content: &str) {
    fs::write(home.join("project/.greenview.toml"), content).unwrap();
}

#[test]
fn test_default_models_dir_under_data_home() {
    let home = home();
    greenview(home.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("greenview/models"));
}

#[test]
fn test_xdg_config_applies() {
    let home = home();
    write_xdg_config(home.path(), "[models]\ndir = '/xdg/models'\n");

    greenview(home.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stdout("/xdg/models\n");
}

#[test]
fn test_project_config_overrides_xdg() {
    let home = home();
    write_xdg_config(home.path(), "[models]\ndir = '/xdg/models'\n");
    write_project_config(home.path(), "[models]\ndir = '/project/models'\n");

    greenview(home.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stdout("/project/models\n");
}

#[test]
fn test_project_config_found_in_parent() {
    let home = home();
    write_project_config(home.path(), "[models]\ndir = '/project/models'\n");
    let nested = home.path().join("project/district/street");
    fs::create_dir_all(&nested).unwrap();

    greenview(home.path())
        .current_dir(&nested)
        .args(["models", "path"])
        .assert()
        .success()
        .stdout("/project/models\n");
}

#[test]
fn test_cli_overrides_project_config() {
    let home = home();
    write_project_config(home.path(), "[models]\ndir = '/project/models'\n");

    greenview(home.path())
        .args(["models", "--models-dir", "/cli/models", "path"])
        .assert()
        .success()
        .stdout("/cli/models\n");
}

#[test]
fn test_invalid_config_value_warns() {
    let home = home();
    write_project_config(home.path(), "[analysis]\ncleanup_cadence = 0\n");

    greenview(home.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "warning: analysis.cleanup_cadence must be at least 1",
        ));
}

#[test]
fn test_malformed_config_is_ignored() {
    let home = home();
    write_project_config(home.path(), "[models\ndir = '/broken'\n");

    greenview(home.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/broken").not())
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_config_report_does_not_apply_to_summarize() {
    let home = home();
    write_project_config(home.path(), "[output]\nreport = 'from-config.csv'\n");
    fs::write(home.path().join("project/records.json"), "[]").unwrap();

    greenview(home.path())
        .args(["summarize", "records.json", "--report", "out.csv"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nothing to export"));
    assert!(!home.path().join("project/from-config.csv").exists());
    assert!(!home.path().join("project/out.csv").exists());
}
