// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario execution
//!
//! Steps run on one thread, so a contended lock can only time out. Broker
//! and fence errors become failed step outcomes; references to names the
//! scenario never bound abort the run.

use crate::scenario::{Scenario, Step};
use anyhow::{bail, Result};
use fencelock_core::{
    AsyncWaiter, BrokerConfig, BrokerSnapshot, ContextId, Device, DeviceKind, FenceStatus, Handle,
    LockBroker, LockGroupId, ObjectRegistry, OwnerId, RequesterId, SyncFence,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Owner used for fence events on the device-global context
const SCENARIO_OWNER: OwnerId = OwnerId(0);

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub action: String,
    pub ok: bool,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<String>,
}

/// Whether a step succeeded, and what it did or why it failed
type Outcome = (bool, String);

fn succeeded(detail: impl Into<String>) -> Outcome {
    (true, detail.into())
}

fn failed(err: impl fmt::Display) -> Outcome {
    (false, err.to_string())
}

#[derive(Debug, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub steps: Vec<StepReport>,
    pub broker: BrokerSnapshot,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            writeln!(f, "scenario: {}", name)?;
        }
        for step in &self.steps {
            writeln!(
                f,
                "{:>3} {:<36} {:<4} {}",
                step.step,
                step.action,
                if step.ok { "ok" } else { "err" },
                step.detail
            )?;
            for note in &step.notifications {
                writeln!(f, "    -> {}", note)?;
            }
        }

        writeln!(f, "groups:")?;
        if self.broker.groups.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for group in &self.broker.groups {
            let handles: Vec<String> = group.handles.iter().map(|h| h.to_string()).collect();
            write!(
                f,
                "  {} slot={} state={:?} handles=[{}]",
                group.id,
                group.slot,
                group.state,
                handles.join(" ")
            )?;
            if let Some(deferred) = &group.deferred {
                write!(f, " until={}@{}", deferred.timestamp, deferred.device)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "objects:")?;
        if self.broker.objects.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for object in &self.broker.objects {
            let holder = object
                .holder
                .map_or_else(|| "-".to_string(), |h| h.to_string());
            writeln!(
                f,
                "  handle {} holder={} waiters={} memberships={}",
                object.handle, holder, object.waiters, object.memberships
            )?;
        }
        Ok(())
    }
}

pub struct Runner {
    config: BrokerConfig,
    registry: ObjectRegistry,
    broker: LockBroker<ObjectRegistry>,
    devices: HashMap<DeviceKind, Device>,
    objects: HashMap<String, Handle>,
    groups: HashMap<String, LockGroupId>,
    fences: HashMap<String, SyncFence>,
    watches: HashMap<String, AsyncWaiter>,
    notifications: Arc<Mutex<Vec<String>>>,
}

impl Runner {
    pub fn new(config: BrokerConfig) -> Self {
        let registry = ObjectRegistry::new();
        let devices = [DeviceKind::ThreeD, DeviceKind::TwoD]
            .into_iter()
            .map(|kind| (kind, Device::new(kind)))
            .collect();
        Self {
            broker: LockBroker::new(config.clone(), registry.clone()),
            config,
            registry,
            devices,
            objects: HashMap::new(),
            groups: HashMap::new(),
            fences: HashMap::new(),
            watches: HashMap::new(),
            notifications: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn run(mut self, scenario: &Scenario) -> Result<Report> {
        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let (ok, detail) = self.execute(step)?;
            tracing::debug!(step = index + 1, ok, detail = %detail, "step finished");
            steps.push(StepReport {
                step: index + 1,
                action: step.describe(),
                ok,
                detail,
                notifications: self.drain_notifications(),
            });
        }
        Ok(Report {
            name: scenario.name.clone(),
            steps,
            broker: self.broker.snapshot(),
        })
    }

    fn drain_notifications(&self) -> Vec<String> {
        let mut notes = self.notifications.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *notes)
    }

    fn object(&self, name: &str) -> Result<Handle> {
        match self.objects.get(name) {
            Some(handle) => Ok(*handle),
            None => bail!("unknown object '{}'", name),
        }
    }

    fn group(&self, name: &str) -> Result<LockGroupId> {
        match self.groups.get(name) {
            Some(id) => Ok(*id),
            None => bail!("unknown lock group '{}'", name),
        }
    }

    fn fence(&self, name: &str) -> Result<SyncFence> {
        match self.fences.get(name) {
            Some(fence) => Ok(fence.clone()),
            None => bail!("unknown fence '{}'", name),
        }
    }

    fn device(&self, kind: DeviceKind) -> Result<&Device> {
        match self.devices.get(&kind) {
            Some(device) => Ok(device),
            None => bail!("no {} device", kind),
        }
    }

    fn execute(&mut self, step: &Step) -> Result<Outcome> {
        let outcome = match step {
            Step::Create { object } => {
                let handle = self.registry.create();
                self.objects.insert(object.clone(), handle);
                succeeded(format!("handle {}", handle))
            }
            Step::Close { object } => {
                let handle = self.object(object)?;
                if self.registry.close(handle) {
                    succeeded(format!("closed handle {}", handle))
                } else {
                    failed(format!("handle {} already closed", handle))
                }
            }
            Step::Lock {
                group,
                requester,
                objects,
                timeout,
            } => {
                let handles = objects
                    .iter()
                    .map(|name| self.object(name))
                    .collect::<Result<Vec<_>>>()?;
                let timeout = timeout.unwrap_or(self.config.wait_timeout);
                match self
                    .broker
                    .lock_handles_timeout(&handles, RequesterId(*requester), timeout)
                {
                    Ok(id) => {
                        self.groups.insert(group.clone(), id);
                        succeeded(format!("granted lock {}", id))
                    }
                    Err(err) => failed(err),
                }
            }
            Step::Unlock { group } => match self.broker.unlock_handles(self.group(group)?) {
                Ok(()) => succeeded("released"),
                Err(err) => failed(err),
            },
            Step::UnlockOnTimestamp {
                group,
                timestamp,
                device,
            } => {
                let id = self.group(group)?;
                let device = self.device(*device)?;
                match self.broker.unlock_on_timestamp(id, *timestamp, device) {
                    Ok(()) => match self.broker.group_state(id) {
                        Some(state) => succeeded(format!("deferred ({:?})", state)),
                        None => succeeded("released"),
                    },
                    Err(err) => failed(err),
                }
            }
            Step::Wakeup { group } => match self.broker.wakeup_group(self.group(group)?) {
                Ok(()) => succeeded("woken"),
                Err(err) => failed(err),
            },
            Step::Retire { timestamp, device } => {
                match self.device(*device)?.retire(ContextId::DEFAULT, *timestamp) {
                    Ok(()) => succeeded(format!("retired through {}", timestamp)),
                    Err(err) => failed(err),
                }
            }
            Step::Fence {
                fence,
                timestamp,
                device,
            } => {
                let device = self.device(*device)?;
                let created = device
                    .add_fence_event(SCENARIO_OWNER, ContextId::DEFAULT, *timestamp)
                    .and_then(|fd| Ok((fd, device.fence(fd)?)));
                match created {
                    Ok((fd, created)) => {
                        self.fences.insert(fence.clone(), created);
                        succeeded(format!("fd {}", fd))
                    }
                    Err(err) => failed(err),
                }
            }
            Step::Merge { fence, from } => {
                let merged = SyncFence::merge(fence.as_str(), &self.fence(&from.0)?, &self.fence(&from.1)?);
                let points = merged.points().len();
                self.fences.insert(fence.clone(), merged);
                succeeded(format!("{} point(s)", points))
            }
            Step::Watch { fence } => {
                let notifications = Arc::clone(&self.notifications);
                let name = fence.clone();
                let waited = self.fence(fence)?.wait_async(move || {
                    notifications
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(format!("fence {} signaled", name));
                });
                match waited {
                    Ok(Some(waiter)) => {
                        self.watches.insert(fence.clone(), waiter);
                        succeeded("watching")
                    }
                    Ok(None) => succeeded("already signaled"),
                    Err(err) => failed(err),
                }
            }
            Step::Cancel { fence } => {
                if self.watches.remove(fence).is_some_and(AsyncWaiter::cancel) {
                    succeeded("cancelled")
                } else {
                    failed("no pending watch")
                }
            }
            Step::Wait { fence, timeout } => {
                let fence = self.fence(fence)?;
                match fence.wait(timeout.unwrap_or(Duration::ZERO)) {
                    Ok(()) => succeeded(status_name(fence.status())),
                    Err(err) => failed(err),
                }
            }
        };
        Ok(outcome)
    }
}

fn status_name(status: FenceStatus) -> &'static str {
    match status {
        FenceStatus::Active => "active",
        FenceStatus::Signaled => "signaled",
        FenceStatus::Error => "error",
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
