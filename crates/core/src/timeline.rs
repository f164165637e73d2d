// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timelines and fence points
//!
//! A timeline tracks the highest timestamp a producer has completed. A fence
//! point names a target timestamp on one timeline and is signaled once the
//! timeline reaches it.

use crate::error::SyncError;
use crate::timestamp::{timestamp_cmp, timestamp_max, timestamp_passed, Timestamp};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};

/// Something waiting on a timeline's progress
///
/// `poll` runs without the timeline lock held. Returning `true` removes the
/// watcher from the timeline.
pub(crate) trait Watcher: Send + Sync {
    fn id(&self) -> u64;
    fn poll(&self) -> bool;
}

struct TimelineState {
    last_timestamp: Timestamp,
    destroyed: bool,
    live_points: usize,
    watchers: Vec<Arc<dyn Watcher>>,
}

struct TimelineInner {
    name: String,
    state: Mutex<TimelineState>,
}

impl Drop for TimelineInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if !state.destroyed {
            tracing::warn!(timeline = %self.name, "timeline released without being destroyed");
        }
    }
}

/// A monotonically advancing completion counter for one execution context
#[derive(Clone)]
pub struct Timeline {
    inner: Arc<TimelineInner>,
}

impl Timeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TimelineInner {
                name: name.into(),
                state: Mutex::new(TimelineState {
                    last_timestamp: 0,
                    destroyed: false,
                    live_points: 0,
                    watchers: Vec::new(),
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TimelineState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Highest timestamp known to have completed
    pub fn last_timestamp(&self) -> Timestamp {
        self.state().last_timestamp
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().destroyed
    }

    /// Number of fence points derived from this timeline that are still alive
    pub fn live_points(&self) -> usize {
        self.state().live_points
    }

    /// Check whether the timeline has reached `timestamp`
    pub fn has_reached(&self, timestamp: Timestamp) -> bool {
        timestamp_passed(self.last_timestamp(), timestamp)
    }

    /// True when both handles refer to the same timeline
    pub fn same_as(&self, other: &Timeline) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Advance the timeline to `timestamp` and notify watchers
    ///
    /// Timestamps behind the current position are ignored.
    pub fn signal(&self, timestamp: Timestamp) {
        {
            let mut state = self.state();
            state.last_timestamp = timestamp_max(state.last_timestamp, timestamp);
            tracing::trace!(
                timeline = %self.inner.name,
                timestamp,
                last = state.last_timestamp,
                "timeline signaled"
            );
        }
        self.notify_watchers();
    }

    /// Destroy the timeline
    ///
    /// Points that have not signaled yet report an error from now on, and
    /// watchers are notified so their fences can complete.
    pub fn destroy(&self) {
        {
            let mut state = self.state();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            tracing::debug!(
                timeline = %self.inner.name,
                live_points = state.live_points,
                "timeline destroyed"
            );
        }
        self.notify_watchers();
    }

    /// Create a point that signals once the timeline reaches `timestamp`
    pub fn create_point(&self, timestamp: Timestamp) -> Result<FencePoint, SyncError> {
        if self.is_destroyed() {
            return Err(SyncError::TimelineDestroyed(self.inner.name.clone()));
        }
        Ok(self.new_point(timestamp))
    }

    fn new_point(&self, timestamp: Timestamp) -> FencePoint {
        self.state().live_points += 1;
        FencePoint {
            timeline: self.clone(),
            timestamp,
        }
    }

    pub(crate) fn add_watcher(&self, watcher: Arc<dyn Watcher>) {
        self.state().watchers.push(watcher);
    }

    pub(crate) fn remove_watcher(&self, id: u64) {
        self.state().watchers.retain(|w| w.id() != id);
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(&self) -> usize {
        self.state().watchers.len()
    }

    fn notify_watchers(&self) {
        let watchers: Vec<Arc<dyn Watcher>> = self.state().watchers.clone();
        let finished: Vec<u64> = watchers
            .iter()
            .filter(|w| w.poll())
            .map(|w| w.id())
            .collect();
        if !finished.is_empty() {
            self.state().watchers.retain(|w| !finished.contains(&w.id()));
        }
    }
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Timeline")
            .field("name", &self.inner.name)
            .field("last_timestamp", &state.last_timestamp)
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

/// Signal state of a single fence point
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointStatus {
    Active,
    Signaled,
    /// The timeline was destroyed before the point signaled
    Error,
}

/// A target timestamp on a timeline
#[derive(Debug)]
pub struct FencePoint {
    timeline: Timeline,
    timestamp: Timestamp,
}

impl FencePoint {
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn status(&self) -> PointStatus {
        let state = self.timeline.state();
        if timestamp_passed(state.last_timestamp, self.timestamp) {
            PointStatus::Signaled
        } else if state.destroyed {
            PointStatus::Error
        } else {
            PointStatus::Active
        }
    }

    pub fn has_signaled(&self) -> bool {
        self.status() == PointStatus::Signaled
    }

    /// Order two points by their target timestamps
    pub fn compare(&self, other: &FencePoint) -> Ordering {
        timestamp_cmp(self.timestamp, other.timestamp)
    }

    /// A new point on the same timeline with the same target
    pub fn duplicate(&self) -> FencePoint {
        self.timeline.new_point(self.timestamp)
    }

    /// Release a point that was never adopted by a fence
    pub fn destroy(self) {
        tracing::trace!(
            timeline = %self.timeline.inner.name,
            timestamp = self.timestamp,
            "fence point destroyed"
        );
    }
}

impl Drop for FencePoint {
    fn drop(&mut self) {
        let mut state = self.timeline.state();
        state.live_points = state.live_points.saturating_sub(1);
    }
}

#[cfg(test)]
#[path = "timeline_tests.rs"]
mod tests;
