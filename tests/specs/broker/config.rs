//! Broker config specs

use crate::prelude::*;

const DEFAULT_CONFIG: &str = "\
group_slots = 20
wait_entries = 5
membership_slots = 20
wait_timeout = \"64ms\"
id_wrap = 4294967280
handle_order = \"as-given\"
";

#[test]
fn config_prints_defaults() {
    let temp = Project::empty();
    temp.fencelock()
        .args(&["config"])
        .passes()
        .stdout_eq(DEFAULT_CONFIG);
}

#[test]
fn config_file_is_merged_over_defaults() {
    let temp = Project::empty();
    temp.file("broker.toml", "handle_order = \"sorted\"\nwait_timeout = \"1s\"\n");
    temp.fencelock()
        .args(&["config", "--config", "broker.toml"])
        .passes()
        .stdout_has("handle_order = \"sorted\"")
        .stdout_has("wait_timeout = \"1s\"")
        .stdout_has("group_slots = 20");
}

#[test]
fn unknown_config_key_fails() {
    let temp = Project::empty();
    temp.file("broker.toml", "slots = 3\n");
    temp.fencelock()
        .args(&["config", "--config", "broker.toml"])
        .fails()
        .stderr_has("failed to parse config");
}

#[test]
fn config_check_is_silent() {
    let temp = Project::empty();
    temp.fencelock()
        .args(&["config", "--check"])
        .passes()
        .stdout_eq("");
}
