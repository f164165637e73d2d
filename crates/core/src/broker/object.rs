// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-object lock state: holder, FIFO waiters, and membership records

use super::RequesterId;
use crate::registry::Handle;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar};

/// A blocked acquisition queued on an object
#[derive(Debug)]
pub(crate) struct Waiter {
    pub id: u64,
    pub requester: RequesterId,
    pub wake: Arc<Condvar>,
}

#[derive(Debug)]
pub(crate) struct LockObject {
    /// First handle the object was seen under, for reporting
    pub handle: Handle,
    pub holder: Option<RequesterId>,
    /// Waiter popped by a release and entitled to claim next
    pub handoff: Option<u64>,
    waiters: VecDeque<Waiter>,
    wait_capacity: usize,
    memberships: Vec<Option<usize>>,
}

impl LockObject {
    pub fn new(handle: Handle, membership_slots: usize, wait_entries: usize) -> Self {
        Self {
            handle,
            holder: None,
            handoff: None,
            waiters: VecDeque::with_capacity(wait_entries),
            wait_capacity: wait_entries,
            memberships: vec![None; membership_slots],
        }
    }

    /// Record that the group in `slot` names this object
    pub fn claim_membership(&mut self, slot: usize) -> Option<usize> {
        let record = self.memberships.iter().position(Option::is_none)?;
        self.memberships[record] = Some(slot);
        Some(record)
    }

    pub fn free_membership(&mut self, record: usize) {
        if let Some(entry) = self.memberships.get_mut(record) {
            *entry = None;
        }
    }

    pub fn membership_count(&self) -> usize {
        self.memberships.iter().filter(|m| m.is_some()).count()
    }

    /// Whether a new (non-queued) acquisition may take the lock right now
    pub fn is_free(&self) -> bool {
        self.holder.is_none() && self.handoff.is_none() && self.waiters.is_empty()
    }

    /// Queue a waiter at the tail; hands it back if the queue is full
    pub fn enqueue(&mut self, waiter: Waiter) -> Result<(), Waiter> {
        if self.waiters.len() >= self.wait_capacity {
            return Err(waiter);
        }
        self.waiters.push_back(waiter);
        Ok(())
    }

    pub fn remove_waiter(&mut self, id: u64) {
        self.waiters.retain(|w| w.id != id);
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Drop the holder and pass the lock to the head waiter, if any
    pub fn release(&mut self) -> Option<RequesterId> {
        self.holder = None;
        let next = self.waiters.pop_front()?;
        self.handoff = Some(next.id);
        next.wake.notify_one();
        Some(next.requester)
    }

    /// Nothing refers to this object any more
    pub fn is_idle(&self) -> bool {
        self.holder.is_none()
            && self.handoff.is_none()
            && self.waiters.is_empty()
            && self.membership_count() == 0
    }
}
