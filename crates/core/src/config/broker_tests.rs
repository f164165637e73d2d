// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn defaults_match_driver_tables() {
    let config = BrokerConfig::default();
    assert_eq!(config.group_slots, 20);
    assert_eq!(config.wait_entries, 5);
    assert_eq!(config.membership_slots, 20);
    assert_eq!(config.wait_timeout, Duration::from_millis(64));
    assert_eq!(config.id_wrap, 0xFFFF_FFF0);
    assert_eq!(config.handle_order, HandleOrder::AsGiven);
}

#[test]
fn partial_toml_keeps_defaults() {
    let config = BrokerConfig::from_toml_str(
        r#"
        group_slots = 4
        wait_timeout = "250ms"
        handle_order = "sorted"
        "#,
    )
    .unwrap();

    assert_eq!(config.group_slots, 4);
    assert_eq!(config.wait_timeout, Duration::from_millis(250));
    assert_eq!(config.handle_order, HandleOrder::Sorted);
    assert_eq!(config.wait_entries, 5);
}

#[test]
fn toml_round_trips_through_render() {
    let config = BrokerConfig::new()
        .with_group_slots(3)
        .with_wait_timeout(Duration::from_secs(2));
    let rendered = config.to_toml().unwrap();
    assert_eq!(BrokerConfig::from_toml_str(&rendered).unwrap(), config);
}

#[test]
fn unknown_keys_are_rejected() {
    let err = BrokerConfig::from_toml_str("fence_slots = 3").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[parameterized(
    no_groups = { "group_slots = 0" },
    no_waiters = { "wait_entries = 0" },
    no_memberships = { "membership_slots = 0" },
    tiny_wrap = { "id_wrap = 1" },
    wrap_within_slots = { "id_wrap = 2\ngroup_slots = 2" },
    wrap_equals_slots = { "id_wrap = 20" },
)]
fn zero_limits_are_invalid(content: &str) {
    let err = BrokerConfig::from_toml_str(content).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn wrap_just_above_slots_is_valid() {
    let config = BrokerConfig::from_toml_str("id_wrap = 3\ngroup_slots = 2").unwrap();
    assert_eq!(config.id_wrap, 3);
}

#[test]
fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broker.toml");
    std::fs::write(&path, "wait_entries = 2\n").unwrap();

    let config = BrokerConfig::load(&path).unwrap();
    assert_eq!(config.wait_entries, 2);
}

#[test]
fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = BrokerConfig::load(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
