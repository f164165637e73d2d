// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario files
//!
//! A scenario is a TOML list of `[[step]]` tables run in order against a
//! fresh broker, object registry, and one device of each kind. Objects,
//! lock groups, and fences are referred to by names the scenario picks.

use anyhow::{Context, Result};
use fencelock_core::{DeviceKind, Timestamp};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

fn default_device() -> DeviceKind {
    DeviceKind::ThreeD
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Step {
    /// Create an object and bind its handle to a name
    Create { object: String },
    /// Close an object's handle; the name keeps the stale handle
    Close { object: String },
    Lock {
        group: String,
        requester: u32,
        objects: Vec<String>,
        #[serde(default, with = "humantime_serde")]
        timeout: Option<Duration>,
    },
    Unlock { group: String },
    UnlockOnTimestamp {
        group: String,
        timestamp: Timestamp,
        #[serde(default = "default_device")]
        device: DeviceKind,
    },
    Wakeup { group: String },
    Retire {
        timestamp: Timestamp,
        #[serde(default = "default_device")]
        device: DeviceKind,
    },
    /// Create a fence that signals when the device retires `timestamp`
    Fence {
        fence: String,
        timestamp: Timestamp,
        #[serde(default = "default_device")]
        device: DeviceKind,
    },
    Merge { fence: String, from: (String, String) },
    /// Register an async wait that reports when the fence signals
    Watch { fence: String },
    Cancel { fence: String },
    Wait {
        fence: String,
        #[serde(default, with = "humantime_serde")]
        timeout: Option<Duration>,
    },
}

impl Step {
    /// One-line summary used in reports
    pub fn describe(&self) -> String {
        match self {
            Step::Create { object } => format!("create {}", object),
            Step::Close { object } => format!("close {}", object),
            Step::Lock {
                group,
                requester,
                objects,
                ..
            } => format!("lock {} [{}] as {}", group, objects.join(" "), requester),
            Step::Unlock { group } => format!("unlock {}", group),
            Step::UnlockOnTimestamp {
                group,
                timestamp,
                device,
            } => format!("unlock {} at {} on {}", group, timestamp, device),
            Step::Wakeup { group } => format!("wakeup {}", group),
            Step::Retire { timestamp, device } => format!("retire {} on {}", timestamp, device),
            Step::Fence {
                fence,
                timestamp,
                device,
            } => format!("fence {} at {} on {}", fence, timestamp, device),
            Step::Merge { fence, from } => format!("merge {} from {} {}", fence, from.0, from.1),
            Step::Watch { fence } => format!("watch {}", fence),
            Step::Cancel { fence } => format!("cancel {}", fence),
            Step::Wait { fence, .. } => format!("wait {}", fence),
        }
    }
}

impl Scenario {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid scenario {}", path.display()))
    }
}
