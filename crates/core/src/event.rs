// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamp expiry events
//!
//! Callbacks registered against a (context, timestamp) pair. They are handed
//! back to the caller once the context retires that timestamp so they can run
//! outside whatever lock guards the queue.

use crate::device::ContextId;
use crate::timestamp::{timestamp_max, timestamp_passed, Timestamp};
use std::collections::HashMap;

/// Why an event callback is running
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// The timestamp retired
    Retired,
    /// The context went away before the timestamp retired
    Cancelled,
}

/// Callback for a timestamp event
pub type EventCallback = Box<dyn FnOnce(EventKind) + Send>;

/// A callback ready to run
pub struct ReadyEvent {
    pub kind: EventKind,
    callback: EventCallback,
}

impl ReadyEvent {
    pub fn run(self) {
        (self.callback)(self.kind);
    }
}

struct PendingEvent {
    timestamp: Timestamp,
    callback: EventCallback,
}

/// Pending timestamp events and the last retired timestamp per context
#[derive(Default)]
pub struct EventQueue {
    retired: HashMap<ContextId, Timestamp>,
    pending: HashMap<ContextId, Vec<PendingEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last timestamp retired on `context`
    pub fn retired(&self, context: ContextId) -> Timestamp {
        self.retired.get(&context).copied().unwrap_or(0)
    }

    pub fn check_timestamp(&self, context: ContextId, timestamp: Timestamp) -> bool {
        timestamp_passed(self.retired(context), timestamp)
    }

    /// Register a callback for `timestamp` on `context`
    ///
    /// Returns the callback as ready when the timestamp already retired.
    pub fn add(
        &mut self,
        context: ContextId,
        timestamp: Timestamp,
        callback: EventCallback,
    ) -> Option<ReadyEvent> {
        if self.check_timestamp(context, timestamp) {
            return Some(ReadyEvent {
                kind: EventKind::Retired,
                callback,
            });
        }
        self.pending
            .entry(context)
            .or_default()
            .push(PendingEvent {
                timestamp,
                callback,
            });
        None
    }

    /// Record that `context` retired `timestamp` and collect expired events
    pub fn retire(&mut self, context: ContextId, timestamp: Timestamp) -> Vec<ReadyEvent> {
        let retired = timestamp_max(self.retired(context), timestamp);
        self.retired.insert(context, retired);

        let Some(events) = self.pending.remove(&context) else {
            return Vec::new();
        };
        let (expired, waiting): (Vec<_>, Vec<_>) = events
            .into_iter()
            .partition(|e| timestamp_passed(retired, e.timestamp));
        if !waiting.is_empty() {
            self.pending.insert(context, waiting);
        }
        expired
            .into_iter()
            .map(|e| ReadyEvent {
                kind: EventKind::Retired,
                callback: e.callback,
            })
            .collect()
    }

    /// Drop all state for `context`, cancelling its pending events
    pub fn remove_context(&mut self, context: ContextId) -> Vec<ReadyEvent> {
        self.retired.remove(&context);
        self.pending
            .remove(&context)
            .unwrap_or_default()
            .into_iter()
            .map(|e| ReadyEvent {
                kind: EventKind::Cancelled,
                callback: e.callback,
            })
            .collect()
    }

    /// Number of events still waiting
    pub fn pending(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
