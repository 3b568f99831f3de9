//! CLI E2E tests for the `wte` binary.
//!
//! Validates:
//! - `init` creates every configured table in a fresh data dir
//! - `run-all` exit codes: 0 when rows are archived, 1 when nothing is new
//! - JSON envelopes carry schema_version, run_id and the command name
//! - `overview show` and `overview export` read the archived rows
//! - Config errors map to exit code 10
//! - A held store lock maps to exit code 14

mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use wte_config::PipelineConfig;
use wte_core::store::JsonFileStore;

// ============================================================================
// Helpers
// ============================================================================

/// A `wte` command isolated from any user config and data dir.
fn wte(home: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("wte");
    cmd.timeout(Duration::from_secs(60))
        .env_remove("WTE_CONFIG")
        .env_remove("WTE_DATA_DIR")
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"));
    cmd
}

/// A data dir preloaded with the single-batch import.
fn loaded_store() -> TempDir {
    let dir = tempdir().unwrap();
    let mut store = JsonFileStore::open(&dir.path().join("store")).unwrap();
    common::load_import(&mut store, &PipelineConfig::default(), common::single_batch_import());
    dir
}

fn json_stdout(cmd: &mut Command, code: i32) -> Value {
    let output = cmd.assert().code(code).get_output().stdout.clone();
    serde_json::from_slice(&output).expect("parse JSON")
}

// ============================================================================
// Commands
// ============================================================================

#[test]
fn test_init_creates_tables() {
    let home = tempdir().unwrap();
    let data = home.path().join("store");
    let json = json_stdout(
        wte(home.path()).args(["--format", "json", "init", "--data-dir"]).arg(&data),
        0,
    );

    assert_eq!(json["command"], "init");
    assert!(json.get("run_id").is_some(), "should have run_id");
    assert!(json.get("schema_version").is_some(), "should have schema_version");
    assert_eq!(json["result"]["created"].as_array().unwrap().len(), 9);
    assert!(data.join("store.json").exists());
}

#[test]
fn test_run_all_archives_then_reports_nothing_new() {
    let home = loaded_store();
    let data = home.path().join("store");

    let first = json_stdout(
        wte(home.path()).args(["--format", "json", "run-all", "--data-dir"]).arg(&data),
        0,
    );
    assert_eq!(first["command"], "run-all");
    assert_eq!(first["result"]["archive"]["appended"], 1);
    assert_eq!(first["result"]["analyze"]["rows"], 1);

    wte(home.path())
        .args(["run-all", "--data-dir"])
        .arg(&data)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("0 appended"));
}

#[test]
fn test_stages_run_separately() {
    let home = loaded_store();
    let data = home.path().join("store");

    for stage in ["prepare", "analyze", "archive", "cleanup"] {
        wte(home.path())
            .args([stage, "--data-dir"])
            .arg(&data)
            .assert()
            .success();
    }

    let json = json_stdout(
        wte(home.path())
            .args(["--format", "json", "overview", "show", "--data-dir"])
            .arg(&data),
        0,
    );
    let rows = json["result"].as_array().expect("rows array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["batch_key"], "B1");
    assert_eq!(rows[0]["duration_ms"], 2_700_000);
    assert_eq!(rows[0]["counters"][0], 3);
}

#[test]
fn test_overview_export_writes_parquet() {
    let home = loaded_store();
    let data = home.path().join("store");
    wte(home.path())
        .args(["run-all", "--data-dir"])
        .arg(&data)
        .assert()
        .success();

    let out = home.path().join("overview.parquet");
    wte(home.path())
        .args(["overview", "export", "--compression", "snappy", "--data-dir"])
        .arg(&data)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 rows"));
    assert!(fs::metadata(&out).unwrap().len() > 0);
}

// ============================================================================
// Error paths
// ============================================================================

#[test]
fn test_invalid_config_exits_10() {
    let home = tempdir().unwrap();
    let config = home.path().join("pipeline.json");
    fs::write(&config, r#"{"thresholds": {"shift_start": "15:00:00", "shift_end": "06:00:00"}}"#).unwrap();

    wte(home.path())
        .args(["prepare", "--config"])
        .arg(&config)
        .arg("--data-dir")
        .arg(home.path().join("store"))
        .assert()
        .code(10)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_config_validate_reports_errors_as_json() {
    let home = tempdir().unwrap();
    let config = home.path().join("pipeline.toml");
    fs::write(&config, "[markers]\noutlet_location = \" \"\n").unwrap();

    let json = json_stdout(
        wte(home.path())
            .args(["--format", "json", "config", "validate"])
            .arg(&config),
        10,
    );
    assert_eq!(json["result"]["valid"], false);
    assert!(!json["result"]["errors"].as_array().unwrap().is_empty());
}

#[test]
fn test_missing_tables_exit_11() {
    let home = tempdir().unwrap();
    let json = json_stdout(
        wte(home.path())
            .args(["--format", "json", "analyze", "--data-dir"])
            .arg(home.path().join("store")),
        11,
    );
    assert_eq!(json["error"]["stage"], "analyze");
    assert_eq!(json["error"]["code"], 20);
}

#[test]
fn test_held_lock_exits_14() {
    let home = tempdir().unwrap();
    let data = home.path().join("store");
    let _held = JsonFileStore::open(&data).unwrap();

    wte(home.path())
        .args(["prepare", "--data-dir"])
        .arg(&data)
        .assert()
        .code(14);
}

#[test]
fn test_config_schema_is_json() {
    let home = tempdir().unwrap();
    let json = json_stdout(wte(home.path()).args(["config", "schema"]), 0);
    assert!(json["properties"].get("counters").is_some());
}
