//! Error reporting specs
//!
//! Broken inputs exit non-zero with a message on stderr.

use crate::prelude::*;

#[test]
fn missing_subcommand_fails() {
    let temp = Project::empty();
    temp.fencelock().fails();
}

#[test]
fn missing_scenario_file_fails() {
    let temp = Project::empty();
    temp.fencelock()
        .args(&["run", "nope.toml"])
        .fails()
        .stderr_has("failed to read scenario nope.toml");
}

#[test]
fn malformed_scenario_fails() {
    let temp = Project::empty();
    temp.file("bad.toml", "[[step]]\nop = \"teleport\"\n");
    temp.fencelock()
        .args(&["run", "bad.toml"])
        .fails()
        .stderr_has("invalid scenario bad.toml");
}

#[test]
fn unbound_name_fails() {
    let temp = Project::empty();
    temp.file("unbound.toml", "[[step]]\nop = \"unlock\"\ngroup = \"ghost\"\n");
    temp.fencelock()
        .args(&["run", "unbound.toml"])
        .fails()
        .stderr_has("unknown lock group 'ghost'");
}

#[test]
fn step_failures_do_not_fail_the_run() {
    let temp = Project::empty();
    temp.file(
        "double.toml",
        r#"
[[step]]
op = "create"
object = "a"

[[step]]
op = "lock"
group = "g"
requester = 1
objects = ["a"]

[[step]]
op = "unlock"
group = "g"

[[step]]
op = "unlock"
group = "g"
"#,
    );
    temp.fencelock()
        .args(&["run", "double.toml"])
        .passes()
        .stdout_has("invalid lock id 0x1");
}
