//! Lock acquisition specs
//!
//! Scenarios run on one thread, so contention shows up as timeouts.

use crate::prelude::*;

const TWO_OBJECTS: &str = r#"
[[step]]
op = "create"
object = "a"

[[step]]
op = "create"
object = "b"
"#;

#[test]
fn lock_grants_group_and_reports_holder() {
    let temp = Project::empty();
    temp.file(
        "s.toml",
        &format!(
            "{}{}",
            TWO_OBJECTS,
            r#"
[[step]]
op = "lock"
group = "g"
requester = 7
objects = ["a", "b"]
"#
        ),
    );
    temp.fencelock()
        .args(&["run", "s.toml"])
        .passes()
        .stdout_has("granted lock 0x1")
        .stdout_has("state=Active handles=[1 2]")
        .stdout_has("handle 1 holder=7")
        .stdout_has("handle 2 holder=7");
}

#[test]
fn contended_lock_times_out_and_unwinds() {
    let temp = Project::empty();
    temp.file(
        "s.toml",
        &format!(
            "{}{}",
            TWO_OBJECTS,
            r#"
[[step]]
op = "lock"
group = "held"
requester = 1
objects = ["b"]

[[step]]
op = "lock"
group = "blocked"
requester = 2
objects = ["a", "b"]
"#
        ),
    );
    temp.fencelock()
        .args(&["run", "--timeout", "5ms", "s.toml"])
        .passes()
        .stdout_has("timed out after 5ms waiting for handle 2")
        .stdout_lacks("handle 1 holder=2");
}

#[test]
fn same_requester_relocks_without_blocking() {
    let temp = Project::empty();
    temp.file(
        "s.toml",
        &format!(
            "{}{}",
            TWO_OBJECTS,
            r#"
[[step]]
op = "lock"
group = "outer"
requester = 3
objects = ["a"]

[[step]]
op = "lock"
group = "inner"
requester = 3
objects = ["a", "b"]
"#
        ),
    );
    temp.fencelock()
        .args(&["run", "s.toml"])
        .passes()
        .stdout_has("granted lock 0x2")
        .stdout_has("handle 1 holder=3 waiters=0 memberships=2");
}

#[test]
fn group_table_exhaustion_is_reported() {
    let temp = Project::empty();
    temp.file("broker.toml", "group_slots = 1\n");
    temp.file(
        "s.toml",
        &format!(
            "{}{}",
            TWO_OBJECTS,
            r#"
[[step]]
op = "lock"
group = "one"
requester = 1
objects = ["a"]

[[step]]
op = "lock"
group = "two"
requester = 1
objects = ["b"]
"#
        ),
    );
    temp.fencelock()
        .args(&["run", "--config", "broker.toml", "s.toml"])
        .passes()
        .stdout_has("no free lock-group slots");
}

#[test]
fn json_report_includes_broker_tables() {
    let temp = Project::empty();
    temp.file(
        "s.toml",
        &format!(
            "{}{}",
            TWO_OBJECTS,
            r#"
[[step]]
op = "lock"
group = "g"
requester = 1
objects = ["a"]
"#
        ),
    );
    temp.fencelock()
        .args(&["run", "--format", "json", "s.toml"])
        .passes()
        .stdout_has("\"state\": \"active\"")
        .stdout_has("\"requester\": 1");
}
