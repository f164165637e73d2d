// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock broker configuration
//!
//! Defaults mirror the fixed tables of the GEM lock driver: 20 lock groups,
//! 5 waiters and 20 membership records per object, and a 64ms wait.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How `lock_handles` orders the handles it is given
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandleOrder {
    /// Acquire in caller order (callers must agree on an order)
    #[default]
    AsGiven,
    /// Sort and deduplicate handles before acquiring
    Sorted,
}

/// Capacity and timing limits for a lock broker
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    /// Size of the lock-group table
    pub group_slots: usize,
    /// Waiters that may queue on one object
    pub wait_entries: usize,
    /// Lock groups one object may belong to at once
    pub membership_slots: usize,
    /// How long a blocked acquisition waits before failing
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,
    /// Lock-group ids wrap back to 1 on reaching this value
    pub id_wrap: u32,
    pub handle_order: HandleOrder,
}

const HANDLE_WAIT_ENTRIES: usize = 5;

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            group_slots: HANDLE_WAIT_ENTRIES * 4,
            wait_entries: HANDLE_WAIT_ENTRIES,
            membership_slots: HANDLE_WAIT_ENTRIES * 4,
            wait_timeout: Duration::from_millis(64),
            id_wrap: 0xFFFF_FFF0,
            handle_order: HandleOrder::AsGiven,
        }
    }
}

impl BrokerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group_slots(mut self, slots: usize) -> Self {
        self.group_slots = slots;
        self
    }

    pub fn with_wait_entries(mut self, entries: usize) -> Self {
        self.wait_entries = entries;
        self
    }

    pub fn with_membership_slots(mut self, slots: usize) -> Self {
        self.membership_slots = slots;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_id_wrap(mut self, wrap: u32) -> Self {
        self.id_wrap = wrap;
        self
    }

    pub fn with_handle_order(mut self, order: HandleOrder) -> Self {
        self.handle_order = order;
        self
    }

    /// Reject limits the broker cannot operate with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_slots == 0 {
            return Err(ConfigError::Invalid("group_slots must be at least 1".into()));
        }
        if self.wait_entries == 0 {
            return Err(ConfigError::Invalid("wait_entries must be at least 1".into()));
        }
        if self.membership_slots == 0 {
            return Err(ConfigError::Invalid(
                "membership_slots must be at least 1".into(),
            ));
        }
        // Ids run from 1 up to `id_wrap - 1`; every slot must be able to hold one
        if (self.id_wrap as usize) <= self.group_slots {
            return Err(ConfigError::Invalid(format!(
                "id_wrap ({}) must exceed group_slots ({})",
                self.id_wrap, self.group_slots
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BrokerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
