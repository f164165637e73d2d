//! Help and version specs

use crate::prelude::*;

#[test]
fn help_lists_commands() {
    let temp = Project::empty();
    temp.fencelock()
        .args(&["--help"])
        .passes()
        .stdout_has("config")
        .stdout_has("run");
}

#[test]
fn version_names_binary() {
    let temp = Project::empty();
    temp.fencelock()
        .args(&["--version"])
        .passes()
        .stdout_has("fencelock");
}

#[test]
fn run_help_documents_format() {
    let temp = Project::empty();
    temp.fencelock()
        .args(&["run", "--help"])
        .passes()
        .stdout_has("--format")
        .stdout_has("--timeout");
}
