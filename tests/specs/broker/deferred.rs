//! Timestamp-deferred unlock specs

use crate::prelude::*;

const DEFERRED: &str = r#"
[[step]]
op = "create"
object = "a"

[[step]]
op = "lock"
group = "g"
requester = 1
objects = ["a"]

[[step]]
op = "unlock-on-timestamp"
group = "g"
timestamp = 20
device = "2d"
"#;

#[test]
fn deferred_group_stays_locked_until_retire() {
    let temp = Project::empty();
    temp.file("s.toml", DEFERRED);
    temp.fencelock()
        .args(&["run", "s.toml"])
        .passes()
        .stdout_has("deferred (Active)")
        .stdout_has("until=20@2d")
        .stdout_has("holder=1");
}

#[test]
fn retire_on_other_device_does_not_release() {
    let temp = Project::empty();
    temp.file(
        "s.toml",
        &format!("{}{}", DEFERRED, "\n[[step]]\nop = \"retire\"\ntimestamp = 20\ndevice = \"3d\"\n"),
    );
    temp.fencelock()
        .args(&["run", "s.toml"])
        .passes()
        .stdout_has("state=Active")
        .stdout_has("holder=1");
}

#[test]
fn retire_releases_and_leaves_slot_for_cleanup() {
    let temp = Project::empty();
    temp.file(
        "s.toml",
        &format!("{}{}", DEFERRED, "\n[[step]]\nop = \"retire\"\ntimestamp = 21\ndevice = \"2d\"\n"),
    );
    temp.fencelock()
        .args(&["run", "s.toml"])
        .passes()
        .stdout_has("state=NeedsCleanup")
        .stdout_has("holder=-");
}

#[test]
fn passed_timestamp_unlocks_immediately() {
    let temp = Project::empty();
    temp.file(
        "s.toml",
        r#"
[[step]]
op = "retire"
timestamp = 50

[[step]]
op = "create"
object = "a"

[[step]]
op = "lock"
group = "g"
requester = 1
objects = ["a"]

[[step]]
op = "unlock-on-timestamp"
group = "g"
timestamp = 40
"#,
    );
    temp.fencelock()
        .args(&["run", "s.toml"])
        .passes()
        .stdout_has("released")
        .stdout_has("groups:\n  (none)");
}
