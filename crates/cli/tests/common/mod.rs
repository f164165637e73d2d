// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test utilities for CLI integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Write `content` to `name` inside a fresh temp directory.
/// Returns the directory guard and the file path.
pub fn write_file(name: &str, content: &str) -> (TempDir, PathBuf) {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let path = temp.path().join(name);
    fs::write(&path, content).expect("Failed to write file");
    (temp, path)
}

/// Two requesters contend for one object; the second times out.
pub const CONTENDED_SCENARIO: &str = r#"
name = "contended"

[[step]]
op = "create"
object = "a"

[[step]]
op = "lock"
group = "first"
requester = 1
objects = ["a"]

[[step]]
op = "lock"
group = "second"
requester = 2
objects = ["a"]
timeout = "5ms"

[[step]]
op = "unlock-on-timestamp"
group = "first"
timestamp = 12

[[step]]
op = "retire"
timestamp = 12
"#;
