// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI integration tests for config and scenario commands

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(deprecated)]

mod common;

use assert_cmd::Command;
use common::{write_file, CONTENDED_SCENARIO};
use predicates::prelude::*;

fn fencelock() -> Command {
    Command::cargo_bin("fencelock").unwrap()
}

#[test]
fn test_help() {
    fencelock()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("lock broker"));
}

#[test]
fn test_config_prints_defaults() {
    fencelock()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("group_slots = 20"))
        .stdout(predicate::str::contains("wait_timeout = \"64ms\""))
        .stdout(predicate::str::contains("handle_order = \"as-given\""));
}

#[test]
fn test_config_file_overrides_defaults() {
    let (_temp, path) = write_file("broker.toml", "wait_entries = 2\n");
    fencelock()
        .args(["config", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("wait_entries = 2"));
}

#[test]
fn test_invalid_config_fails() {
    let (_temp, path) = write_file("broker.toml", "group_slots = 0\n");
    fencelock()
        .args(["config", "--check", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("group_slots must be at least 1"));
}

#[test]
fn test_run_reports_step_outcomes() {
    let (_temp, path) = write_file("scenario.toml", CONTENDED_SCENARIO);
    fencelock()
        .arg("run")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("scenario: contended"))
        .stdout(predicate::str::contains("granted lock 0x1"))
        .stdout(predicate::str::contains("timed out"))
        .stdout(predicate::str::contains("state=NeedsCleanup"));
}

#[test]
fn test_run_json_output() {
    let (_temp, path) = write_file("scenario.toml", CONTENDED_SCENARIO);
    let output = fencelock()
        .args(["run", "--format", "json"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["steps"].as_array().unwrap().len(), 5);
    assert_eq!(report["steps"][2]["ok"], false);
    assert_eq!(report["broker"]["groups"][0]["state"], "needs_cleanup");
    assert_eq!(report["broker"]["objects"][0]["holder"], serde_json::Value::Null);
}

#[test]
fn test_run_missing_scenario_fails() {
    fencelock()
        .args(["run", "does-not-exist.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read scenario"));
}

#[test]
fn test_run_rejects_bad_timeout() {
    let (_temp, path) = write_file("scenario.toml", CONTENDED_SCENARIO);
    fencelock()
        .args(["run", "--timeout", "soon"])
        .arg(&path)
        .assert()
        .failure();
}
