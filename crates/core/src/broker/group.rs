// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-capacity lock-group table

use super::RequesterId;
use crate::device::DeviceKind;
use crate::registry::{Handle, ObjectId};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Identifier handed back for a granted lock group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockGroupId(pub u32);

impl std::fmt::Display for LockGroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Lifecycle of a lock-group slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    Empty,
    /// Allocated to a `lock_handles` call that has not returned yet
    Acquiring,
    Active,
    /// Released by a timestamp; references are dropped on the next scan
    NeedsCleanup,
}

/// One object in a lock group
#[derive(Clone, Debug)]
pub(crate) struct Member {
    pub handle: Handle,
    pub object: ObjectId,
    /// Index of the membership record claimed on the object
    pub record: usize,
    /// Whether this group took the object lock (as opposed to finding it
    /// already held by the same requester)
    pub acquired: bool,
}

/// Pending timestamp-triggered release
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Deferred {
    pub timestamp: Timestamp,
    pub device: DeviceKind,
}

#[derive(Debug)]
pub(crate) struct GroupSlot {
    pub id: Option<LockGroupId>,
    pub state: GroupState,
    pub requester: Option<RequesterId>,
    pub members: Vec<Member>,
    pub deferred: Option<Deferred>,
}

impl GroupSlot {
    fn empty() -> Self {
        Self {
            id: None,
            state: GroupState::Empty,
            requester: None,
            members: Vec::new(),
            deferred: None,
        }
    }

    /// Reset to empty, handing back the members for release
    pub fn clear(&mut self) -> Vec<Member> {
        let members = std::mem::take(&mut self.members);
        *self = Self::empty();
        members
    }
}

/// The lock-group table and its id counter
#[derive(Debug)]
pub(crate) struct GroupTable {
    slots: Vec<GroupSlot>,
    next_id: u32,
    id_wrap: u32,
}

impl GroupTable {
    pub fn new(capacity: usize, id_wrap: u32) -> Self {
        Self {
            slots: (0..capacity).map(|_| GroupSlot::empty()).collect(),
            next_id: 1,
            id_wrap,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> &GroupSlot {
        &self.slots[index]
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut GroupSlot {
        &mut self.slots[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &GroupSlot)> {
        self.slots.iter().enumerate()
    }

    /// Index of the slot currently holding `id` in one of `states`
    pub fn find(&self, id: LockGroupId, states: &[GroupState]) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.id == Some(id) && states.contains(&s.state))
    }

    /// Hand out the next id not held by any slot
    ///
    /// Tries each id in `1..id_wrap` at most once.
    fn next_free_id(&mut self) -> Option<LockGroupId> {
        for _ in 1..self.id_wrap {
            if self.next_id == 0 || self.next_id >= self.id_wrap {
                self.next_id = 1;
            }
            let id = LockGroupId(self.next_id);
            self.next_id += 1;
            if !self.slots.iter().any(|s| s.id == Some(id)) {
                return Some(id);
            }
        }
        None
    }

    /// Claim an empty slot for `requester`
    ///
    /// `None` when every id is held by a slot; the slot is left untouched.
    pub fn open(&mut self, index: usize, requester: RequesterId) -> Option<LockGroupId> {
        let id = self.next_free_id()?;
        let slot = &mut self.slots[index];
        slot.id = Some(id);
        slot.state = GroupState::Acquiring;
        slot.requester = Some(requester);
        slot.members.clear();
        slot.deferred = None;
        Some(id)
    }
}
