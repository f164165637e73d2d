// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamp-producing devices
//!
//! A device owns execution contexts, each with its own timeline, plus the
//! event queue the producer drives when it retires timestamps. Fence events
//! tie the two together: a fence created for a context timestamp signals the
//! context's timeline when that timestamp retires.

use crate::broker::{RetireCallback, TimestampSource};
use crate::error::SyncError;
use crate::event::{EventCallback, EventQueue, ReadyEvent};
use crate::fence::{AsyncWaiter, FenceFd, FenceTable, SyncFence};
use crate::timeline::Timeline;
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Which timestamp producer a device is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    #[serde(rename = "3d")]
    ThreeD,
    #[serde(rename = "2d")]
    TwoD,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::ThreeD => write!(f, "3d"),
            DeviceKind::TwoD => write!(f, "2d"),
        }
    }
}

/// Identifier of an execution context on a device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(pub u32);

impl ContextId {
    /// The device-global context every device starts with
    pub const DEFAULT: ContextId = ContextId(0);
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the session that created a context
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub u32);

struct Context {
    /// `None` for the device-global context, which any owner may use
    owner: Option<OwnerId>,
    timeline: Timeline,
}

struct DeviceState {
    next_context: u32,
    contexts: HashMap<ContextId, Context>,
    events: EventQueue,
    fences: FenceTable,
}

impl DeviceState {
    fn context(&self, owner: OwnerId, id: ContextId) -> Result<&Context, SyncError> {
        match self.contexts.get(&id) {
            Some(ctx) if ctx.owner.is_none() || ctx.owner == Some(owner) => Ok(ctx),
            _ => Err(SyncError::InvalidContext(id)),
        }
    }

    fn ensure_context(&self, id: ContextId) -> Result<(), SyncError> {
        if self.contexts.contains_key(&id) {
            Ok(())
        } else {
            Err(SyncError::InvalidContext(id))
        }
    }
}

struct DeviceInner {
    kind: DeviceKind,
    state: Mutex<DeviceState>,
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        for ctx in state.contexts.values() {
            ctx.timeline.destroy();
        }
    }
}

/// A timestamp producer with its contexts, events and installed fences
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

fn run_ready(events: impl IntoIterator<Item = ReadyEvent>) {
    for event in events {
        event.run();
    }
}

impl Device {
    pub fn new(kind: DeviceKind) -> Self {
        let mut contexts = HashMap::new();
        contexts.insert(
            ContextId::DEFAULT,
            Context {
                owner: None,
                timeline: Timeline::new(format!("{}-timeline-0", kind)),
            },
        );
        Self {
            inner: Arc::new(DeviceInner {
                kind,
                state: Mutex::new(DeviceState {
                    next_context: 1,
                    contexts,
                    events: EventQueue::new(),
                    fences: FenceTable::new(),
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn kind(&self) -> DeviceKind {
        self.inner.kind
    }

    /// Create a context owned by `owner`
    pub fn create_context(&self, owner: OwnerId) -> ContextId {
        let mut state = self.state();
        let id = ContextId(state.next_context);
        state.next_context += 1;
        state.contexts.insert(
            id,
            Context {
                owner: Some(owner),
                timeline: Timeline::new(format!("{}-timeline-{}", self.inner.kind, id)),
            },
        );
        tracing::debug!(device = %self.inner.kind, context = %id, owner = owner.0, "context created");
        id
    }

    /// Destroy a context, cancelling its events and destroying its timeline
    pub fn destroy_context(&self, owner: OwnerId, id: ContextId) -> Result<(), SyncError> {
        let (timeline, cancelled) = {
            let mut state = self.state();
            match state.contexts.get(&id) {
                Some(ctx) if ctx.owner == Some(owner) => {}
                _ => return Err(SyncError::InvalidContext(id)),
            }
            let cancelled = state.events.remove_context(id);
            let ctx = state
                .contexts
                .remove(&id)
                .ok_or(SyncError::InvalidContext(id))?;
            (ctx.timeline, cancelled)
        };
        run_ready(cancelled);
        timeline.destroy();
        tracing::debug!(device = %self.inner.kind, context = %id, "context destroyed");
        Ok(())
    }

    /// The timeline of a context visible to `owner`
    pub fn timeline(&self, owner: OwnerId, id: ContextId) -> Result<Timeline, SyncError> {
        Ok(self.state().context(owner, id)?.timeline.clone())
    }

    /// Report that `context` completed everything up to `timestamp`
    pub fn retire(&self, context: ContextId, timestamp: Timestamp) -> Result<(), SyncError> {
        let ready = {
            let mut state = self.state();
            state.ensure_context(context)?;
            state.events.retire(context, timestamp)
        };
        tracing::debug!(
            device = %self.inner.kind,
            context = %context,
            timestamp,
            expired = ready.len(),
            "timestamp retired"
        );
        run_ready(ready);
        Ok(())
    }

    pub fn check_timestamp(&self, context: ContextId, timestamp: Timestamp) -> Result<bool, SyncError> {
        let state = self.state();
        state.ensure_context(context)?;
        Ok(state.events.check_timestamp(context, timestamp))
    }

    /// Last timestamp retired on `context`
    pub fn retired(&self, context: ContextId) -> Result<Timestamp, SyncError> {
        let state = self.state();
        state.ensure_context(context)?;
        Ok(state.events.retired(context))
    }

    /// Run `callback` once `context` retires `timestamp`
    pub fn add_event(
        &self,
        context: ContextId,
        timestamp: Timestamp,
        callback: EventCallback,
    ) -> Result<(), SyncError> {
        let ready = {
            let mut state = self.state();
            state.ensure_context(context)?;
            state.events.add(context, timestamp, callback)
        };
        run_ready(ready);
        Ok(())
    }

    /// Number of events not yet retired or cancelled
    pub fn pending_events(&self) -> usize {
        self.state().events.pending()
    }

    /// Create a fence for `timestamp` on a context and install it
    ///
    /// The fence signals when the context retires the timestamp.
    pub fn add_fence_event(
        &self,
        owner: OwnerId,
        context: ContextId,
        timestamp: Timestamp,
    ) -> Result<FenceFd, SyncError> {
        let (fd, ready) = {
            let mut state = self.state();
            let timeline = state.context(owner, context)?.timeline.clone();
            let point = timeline.create_point(timestamp)?;
            let fence = SyncFence::new(format!("{}-fence", self.inner.kind), point);
            let fd = state.fences.install(fence);

            let signal = timeline.clone();
            let ready = state.events.add(
                context,
                timestamp,
                Box::new(move |_| signal.signal(timestamp)),
            );
            (fd, ready)
        };
        tracing::debug!(
            device = %self.inner.kind,
            context = %context,
            timestamp,
            fd = %fd,
            "fence event added"
        );
        run_ready(ready);
        Ok(fd)
    }

    pub fn fence(&self, fd: FenceFd) -> Result<SyncFence, SyncError> {
        self.state().fences.get(fd)
    }

    pub fn close_fence(&self, fd: FenceFd) -> Result<(), SyncError> {
        self.state().fences.close(fd).map(|_| ())
    }

    /// Run `callback` once the fence installed at `fd` signals
    ///
    /// Returns `Ok(None)` without running the callback if it already has.
    pub fn async_wait<F>(&self, fd: FenceFd, callback: F) -> Result<Option<AsyncWaiter>, SyncError>
    where
        F: FnOnce() + Send + 'static,
    {
        let fence = self.fence(fd)?;
        fence.wait_async(callback)
    }

    /// Cancel a wait returned by [`Device::async_wait`]
    ///
    /// `false` when the callback already ran or is running.
    pub fn cancel_async(&self, waiter: AsyncWaiter) -> bool {
        let cancelled = waiter.cancel();
        tracing::trace!(device = %self.inner.kind, cancelled, "async wait cancel");
        cancelled
    }
}

impl TimestampSource for Device {
    fn device_kind(&self) -> DeviceKind {
        self.inner.kind
    }

    fn has_passed(&self, timestamp: Timestamp) -> bool {
        self.state().events.check_timestamp(ContextId::DEFAULT, timestamp)
    }

    fn on_retire(&self, timestamp: Timestamp, callback: RetireCallback) {
        let ready = self.state().events.add(
            ContextId::DEFAULT,
            timestamp,
            Box::new(move |_| callback()),
        );
        run_ready(ready);
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").field("kind", &self.inner.kind).finish()
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
