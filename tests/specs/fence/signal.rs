//! Fence signaling specs

use crate::prelude::*;

#[test]
fn fence_signals_when_device_retires() {
    let temp = Project::empty();
    temp.file(
        "s.toml",
        r#"
[[step]]
op = "fence"
fence = "f"
timestamp = 9

[[step]]
op = "watch"
fence = "f"

[[step]]
op = "retire"
timestamp = 9

[[step]]
op = "wait"
fence = "f"
"#,
    );
    temp.fencelock()
        .args(&["run", "s.toml"])
        .passes()
        .stdout_has("-> fence f signaled")
        .stdout_has("signaled");
}

#[test]
fn unsignaled_fence_wait_times_out() {
    let temp = Project::empty();
    temp.file(
        "s.toml",
        r#"
[[step]]
op = "fence"
fence = "f"
timestamp = 9

[[step]]
op = "wait"
fence = "f"
timeout = "2ms"
"#,
    );
    temp.fencelock()
        .args(&["run", "s.toml"])
        .passes()
        .stdout_has("timed out after 2ms waiting for fence");
}

#[test]
fn watch_on_signaled_fence_reports_immediately() {
    let temp = Project::empty();
    temp.file(
        "s.toml",
        r#"
[[step]]
op = "retire"
timestamp = 4
device = "2d"

[[step]]
op = "fence"
fence = "f"
timestamp = 3
device = "2d"

[[step]]
op = "retire"
timestamp = 4
device = "2d"

[[step]]
op = "watch"
fence = "f"
"#,
    );
    temp.fencelock()
        .args(&["run", "s.toml"])
        .passes()
        .stdout_has("already signaled");
}
