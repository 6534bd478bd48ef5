//! CLI end-to-end tests
//!
//! Tests for the animeshelf command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the animeshelf binary
#[allow(deprecated)]
fn animeshelf_cmd() -> Command {
    let mut cmd = Command::cargo_bin("animeshelf").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = animeshelf_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = animeshelf_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("animeshelf"))
        .stdout(predicate::str::contains("scan"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = animeshelf_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("animeshelf"));
}

#[test]
fn test_cli_validate_defaults_warns_about_missing_key() {
    let mut cmd = animeshelf_cmd();
    cmd.arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("using defaults"))
        .stdout(predicate::str::contains("tmdb_api_key"));
}

#[test]
fn test_cli_validate_config_file() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.json");
    fs::write(
        &config,
        r#"{"library": {"roots": ["/srv/anime"]}, "enrichment": {"enabled": false}}"#,
    )
    .unwrap();

    let mut cmd = animeshelf_cmd();
    cmd.args(["validate", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Roots: 1"))
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_cli_dir_add_and_list() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("shelf.db");
    let library = dir.path().join("anime");
    fs::create_dir_all(&library).unwrap();
    let library = library.canonicalize().unwrap();

    animeshelf_cmd()
        .args(["dir", "add"])
        .arg(&library)
        .args(["--description", "main shelf", "--db"])
        .arg(&db)
        .assert()
        .success();

    animeshelf_cmd()
        .args(["dir", "list", "--db"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains(library.to_string_lossy().to_string()))
        .stdout(predicate::str::contains("main shelf"));
}

#[test]
fn test_cli_scan_root_without_enrichment() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("shelf.db");
    let library = dir.path().join("anime");
    let season = library.join("Frieren").join("Season 1");
    fs::create_dir_all(&season).unwrap();
    fs::write(season.join("[Group] Frieren - 03 [1080p].mkv"), b"video").unwrap();

    animeshelf_cmd()
        .args(["scan", "--no-enrich", "--root"])
        .arg(&library)
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("New series: Frieren"))
        .stdout(predicate::str::contains("1 added"));

    animeshelf_cmd()
        .args(["list", "--db"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("Frieren"));
}

#[test]
fn test_cli_scan_without_roots_fails() {
    let dir = tempdir().unwrap();
    animeshelf_cmd()
        .args(["scan", "--no-enrich", "--db"])
        .arg(dir.path().join("shelf.db"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to scan"));
}

#[test]
fn test_cli_cleanup_on_empty_catalog() {
    let dir = tempdir().unwrap();
    animeshelf_cmd()
        .args(["cleanup", "--db"])
        .arg(dir.path().join("shelf.db"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 empty series"));
}
