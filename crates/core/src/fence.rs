// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync fences and the asynchronous wait bridge
//!
//! A fence adopts one or more fence points and signals once all of them have.
//! Waiters either block on the fence or register a callback that runs exactly
//! once, on the thread whose timeline signal completed the fence.

use crate::error::SyncError;
use crate::timeline::{FencePoint, PointStatus, Timeline, Watcher};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

static NEXT_WAITER_ID: AtomicU64 = AtomicU64::new(1);

/// Callback run when an awaited fence completes
pub type FenceCallback = Box<dyn FnOnce() + Send>;

/// Aggregate state of a fence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceStatus {
    Active,
    Signaled,
    /// At least one point can no longer signal
    Error,
}

struct FenceInner {
    name: String,
    points: Vec<FencePoint>,
}

/// A fence owning the points it was built from
#[derive(Clone)]
pub struct SyncFence {
    inner: Arc<FenceInner>,
}

impl SyncFence {
    /// Create a fence that adopts `point`
    pub fn new(name: impl Into<String>, point: FencePoint) -> Self {
        Self {
            inner: Arc::new(FenceInner {
                name: name.into(),
                points: vec![point],
            }),
        }
    }

    /// Create a fence that signals once both `a` and `b` have
    ///
    /// Points sharing a timeline collapse into the later of the two.
    pub fn merge(name: impl Into<String>, a: &SyncFence, b: &SyncFence) -> Self {
        let mut points: Vec<FencePoint> = Vec::new();
        for point in a.inner.points.iter().chain(b.inner.points.iter()) {
            let same_timeline = points
                .iter()
                .position(|p| p.timeline().same_as(point.timeline()));
            match same_timeline {
                Some(index) => {
                    if point.compare(&points[index]) == Ordering::Greater {
                        points[index] = point.duplicate();
                    }
                }
                None => points.push(point.duplicate()),
            }
        }
        Self {
            inner: Arc::new(FenceInner {
                name: name.into(),
                points,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn points(&self) -> &[FencePoint] {
        &self.inner.points
    }

    pub fn status(&self) -> FenceStatus {
        let mut status = FenceStatus::Signaled;
        for point in &self.inner.points {
            match point.status() {
                PointStatus::Error => return FenceStatus::Error,
                PointStatus::Active => status = FenceStatus::Active,
                PointStatus::Signaled => {}
            }
        }
        status
    }

    fn distinct_timelines(&self) -> Vec<Timeline> {
        let mut timelines: Vec<Timeline> = Vec::new();
        for point in &self.inner.points {
            if !timelines.iter().any(|t| t.same_as(point.timeline())) {
                timelines.push(point.timeline().clone());
            }
        }
        timelines
    }

    fn settled(&self) -> Result<(), SyncError> {
        match self.status() {
            FenceStatus::Error => Err(SyncError::FenceError(self.inner.name.clone())),
            _ => Ok(()),
        }
    }

    /// Run `callback` once the fence signals
    ///
    /// Returns `Ok(None)` without running the callback when the fence has
    /// already signaled, and an error when it already failed.
    pub fn wait_async<F>(&self, callback: F) -> Result<Option<AsyncWaiter>, SyncError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.status() != FenceStatus::Active {
            return self.settled().map(|()| None);
        }

        let shared = Arc::new(WaitShared {
            id: NEXT_WAITER_ID.fetch_add(1, AtomicOrdering::Relaxed),
            fence: self.clone(),
            callback: Mutex::new(Some(Box::new(callback))),
        });
        for timeline in self.distinct_timelines() {
            timeline.add_watcher(shared.clone());
        }

        // The fence may have completed before the watchers were in place
        if self.status() != FenceStatus::Active && shared.take_callback().is_some() {
            shared.detach();
            return self.settled().map(|()| None);
        }

        tracing::trace!(fence = %self.inner.name, waiter = shared.id, "async wait registered");
        Ok(Some(AsyncWaiter { shared }))
    }

    /// Block until the fence signals or `timeout` elapses
    pub fn wait(&self, timeout: Duration) -> Result<(), SyncError> {
        let pair = Arc::new((Mutex::new(false), Condvar::new()));
        let notify = Arc::clone(&pair);
        let waiter = self.wait_async(move || {
            let (done, cvar) = &*notify;
            *done.lock().unwrap_or_else(|e| e.into_inner()) = true;
            cvar.notify_all();
        })?;
        let Some(waiter) = waiter else {
            return Ok(());
        };

        let (done, cvar) = &*pair;
        let guard = done.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |done| !*done)
            .unwrap_or_else(|e| e.into_inner());
        let completed = *guard;
        drop(guard);

        if !completed && waiter.cancel() {
            return Err(SyncError::Timeout(timeout));
        }
        self.settled()
    }
}

impl std::fmt::Debug for SyncFence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncFence")
            .field("name", &self.inner.name)
            .field("points", &self.inner.points.len())
            .finish()
    }
}

struct WaitShared {
    id: u64,
    fence: SyncFence,
    callback: Mutex<Option<FenceCallback>>,
}

impl WaitShared {
    fn take_callback(&self) -> Option<FenceCallback> {
        self.callback.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn detach(&self) {
        for timeline in self.fence.distinct_timelines() {
            timeline.remove_watcher(self.id);
        }
    }
}

impl Watcher for WaitShared {
    fn id(&self) -> u64 {
        self.id
    }

    fn poll(&self) -> bool {
        if self.fence.status() == FenceStatus::Active {
            return false;
        }
        if let Some(callback) = self.take_callback() {
            tracing::trace!(fence = %self.fence.inner.name, waiter = self.id, "async wait fired");
            callback();
            self.detach();
        }
        true
    }
}

/// Handle to a registered asynchronous fence wait
pub struct AsyncWaiter {
    shared: Arc<WaitShared>,
}

impl AsyncWaiter {
    /// Unregister the callback
    ///
    /// Returns `true` when the callback was removed before it ran. If the
    /// fence completed first the callback has run (or is running) and this
    /// returns `false`.
    pub fn cancel(self) -> bool {
        match self.shared.take_callback() {
            Some(_) => {
                self.shared.detach();
                tracing::trace!(waiter = self.shared.id, "async wait cancelled");
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for AsyncWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncWaiter")
            .field("id", &self.shared.id)
            .field("fence", &self.shared.fence.inner.name)
            .finish()
    }
}

/// File-descriptor-like number naming an installed fence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FenceFd(pub u32);

impl std::fmt::Display for FenceFd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Table of installed fences
#[derive(Debug, Default)]
pub struct FenceTable {
    next_fd: u32,
    fences: HashMap<FenceFd, SyncFence>,
}

impl FenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fence under a fresh fd
    pub fn install(&mut self, fence: SyncFence) -> FenceFd {
        loop {
            self.next_fd = self.next_fd.wrapping_add(1).max(1);
            let fd = FenceFd(self.next_fd);
            if !self.fences.contains_key(&fd) {
                self.fences.insert(fd, fence);
                return fd;
            }
        }
    }

    pub fn get(&self, fd: FenceFd) -> Result<SyncFence, SyncError> {
        self.fences
            .get(&fd)
            .cloned()
            .ok_or(SyncError::InvalidFence(fd))
    }

    /// Drop the table's reference to a fence
    pub fn close(&mut self, fd: FenceFd) -> Result<SyncFence, SyncError> {
        self.fences.remove(&fd).ok_or(SyncError::InvalidFence(fd))
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}

#[cfg(test)]
#[path = "fence_tests.rs"]
mod tests;
