// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-object lock broker
//!
//! A requester locks a set of object handles as one lock group. Each object
//! has at most one holder and a bounded FIFO of blocked requesters. A group
//! is released explicitly, or deferred until a [`TimestampSource`] retires a
//! timestamp, after which the slot waits in `NeedsCleanup` until the next
//! slot scan drops its object references.
//!
//! All broker state sits behind one mutex. Blocked acquisitions wait on a
//! per-waiter condvar so the mutex is free while they sleep.

mod group;
mod object;
mod source;

pub use group::{GroupState, LockGroupId};
pub use source::{RetireCallback, TimestampSource};

use crate::config::{BrokerConfig, HandleOrder};
use crate::device::DeviceKind;
use crate::error::{LockError, Resource};
use crate::registry::{Handle, HandleResolver, ObjectId, ObjectRegistry};
use crate::timestamp::{timestamp_passed, Timestamp};
use group::{Deferred, GroupTable, Member};
use object::{LockObject, Waiter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Identity of the party taking locks (a process or session)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequesterId(pub u32);

impl std::fmt::Display for RequesterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cleanup {
    /// Explicit unlock: drop every lock the requester holds, waking waiters
    Unlock,
    /// Failed acquisition: drop only the locks this call took
    Unwind,
    /// Slot already released by a timestamp; locks are gone
    Reclaim,
}

enum Attempt {
    Granted,
    Queued {
        object: ObjectId,
        waiter: u64,
        wake: Arc<Condvar>,
    },
}

struct BrokerState {
    groups: GroupTable,
    objects: HashMap<ObjectId, LockObject>,
    next_waiter: u64,
}

impl BrokerState {
    /// First empty slot, reclaiming timestamp-released slots on the way
    fn find_empty_slot<R: HandleResolver + ?Sized>(&mut self, resolver: &R) -> Option<usize> {
        for index in 0..self.groups.capacity() {
            let state = self.groups.slot(index).state;
            match state {
                GroupState::Empty => return Some(index),
                GroupState::NeedsCleanup => {
                    self.cleanup(index, Cleanup::Reclaim, resolver);
                    return Some(index);
                }
                GroupState::Acquiring | GroupState::Active => {}
            }
        }
        None
    }

    fn mark_acquired(&mut self, slot: usize) {
        if let Some(member) = self.groups.slot_mut(slot).members.last_mut() {
            member.acquired = true;
        }
    }

    fn try_acquire<R: HandleResolver + ?Sized>(
        &mut self,
        slot: usize,
        handle: Handle,
        requester: RequesterId,
        config: &BrokerConfig,
        resolver: &R,
    ) -> Result<Attempt, LockError> {
        let object = resolver.lookup(handle).ok_or(LockError::InvalidHandle(handle))?;
        let lock = self.objects.entry(object).or_insert_with(|| {
            LockObject::new(handle, config.membership_slots, config.wait_entries)
        });

        let Some(record) = lock.claim_membership(slot) else {
            let idle = lock.is_idle();
            if idle {
                self.objects.remove(&object);
            }
            resolver.release(object);
            tracing::warn!(handle = %handle, "object membership records exhausted");
            return Err(LockError::ResourceExhausted(Resource::Memberships(handle)));
        };
        self.groups.slot_mut(slot).members.push(Member {
            handle,
            object,
            record,
            acquired: false,
        });

        if lock.holder == Some(requester) {
            tracing::trace!(handle = %handle, requester = %requester, "already held by requester");
            return Ok(Attempt::Granted);
        }
        if lock.is_free() {
            lock.holder = Some(requester);
            self.mark_acquired(slot);
            return Ok(Attempt::Granted);
        }

        self.next_waiter += 1;
        let waiter = self.next_waiter;
        let wake = Arc::new(Condvar::new());
        let queued = lock.enqueue(Waiter {
            id: waiter,
            requester,
            wake: Arc::clone(&wake),
        });
        if queued.is_err() {
            tracing::warn!(handle = %handle, "object wait entries exhausted");
            return Err(LockError::ResourceExhausted(Resource::Waiters(handle)));
        }
        tracing::debug!(handle = %handle, requester = %requester, holder = ?lock.holder, "waiting for object");
        Ok(Attempt::Queued {
            object,
            waiter,
            wake,
        })
    }

    /// Take the lock if a release handed it to `waiter`
    fn claim_handoff(&mut self, object: ObjectId, waiter: u64, requester: RequesterId, slot: usize) -> bool {
        let Some(lock) = self.objects.get_mut(&object) else {
            return false;
        };
        if lock.handoff != Some(waiter) {
            return false;
        }
        lock.handoff = None;
        lock.holder = Some(requester);
        self.mark_acquired(slot);
        true
    }

    fn abandon_wait(&mut self, object: ObjectId, waiter: u64) {
        if let Some(lock) = self.objects.get_mut(&object) {
            lock.remove_waiter(waiter);
        }
    }

    /// Release the object locks a group's requester holds, newest first
    fn release_locks(&mut self, slot: usize, only_acquired: bool) {
        let group = self.groups.slot(slot);
        let requester = group.requester;
        for member in group.members.iter().rev() {
            if only_acquired && !member.acquired {
                continue;
            }
            let Some(lock) = self.objects.get_mut(&member.object) else {
                continue;
            };
            if lock.holder.is_none() || lock.holder != requester {
                continue;
            }
            let next = lock.release();
            tracing::debug!(handle = %member.handle, next = ?next, "object released");
        }
    }

    /// Return a slot to `Empty`, dropping memberships and object references
    fn cleanup<R: HandleResolver + ?Sized>(&mut self, slot: usize, mode: Cleanup, resolver: &R) {
        match mode {
            Cleanup::Unlock => self.release_locks(slot, false),
            Cleanup::Unwind => self.release_locks(slot, true),
            Cleanup::Reclaim => {}
        }
        for member in self.groups.slot_mut(slot).clear().into_iter().rev() {
            let idle = match self.objects.get_mut(&member.object) {
                Some(lock) => {
                    lock.free_membership(member.record);
                    lock.is_idle()
                }
                None => false,
            };
            if idle {
                self.objects.remove(&member.object);
            }
            resolver.release(member.object);
        }
    }

    /// Timestamp-triggered release: wake waiters but keep references
    fn wake_group(&mut self, slot: usize) {
        self.release_locks(slot, false);
        let group = self.groups.slot_mut(slot);
        group.state = GroupState::NeedsCleanup;
        group.deferred = None;
    }

    fn lookup_object(&self, object: ObjectId) -> Option<&LockObject> {
        self.objects.get(&object)
    }
}

struct Shared<R> {
    config: BrokerConfig,
    resolver: R,
    state: Mutex<BrokerState>,
}

/// Serializes access to sets of objects across requesters
pub struct LockBroker<R: HandleResolver = ObjectRegistry> {
    shared: Arc<Shared<R>>,
}

impl<R: HandleResolver> Clone for LockBroker<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: HandleResolver + 'static> LockBroker<R> {
    pub fn new(config: BrokerConfig, resolver: R) -> Self {
        let state = BrokerState {
            groups: GroupTable::new(config.group_slots, config.id_wrap),
            objects: HashMap::new(),
            next_waiter: 0,
        };
        Self {
            shared: Arc::new(Shared {
                config,
                resolver,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.shared.config
    }

    pub fn resolver(&self) -> &R {
        &self.shared.resolver
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ordered(&self, handles: &[Handle]) -> Vec<Handle> {
        let mut handles = handles.to_vec();
        if self.shared.config.handle_order == HandleOrder::Sorted {
            handles.sort_unstable();
            handles.dedup();
        }
        handles
    }

    /// Lock every object in `handles` for `requester` as one group
    ///
    /// Blocks for at most the configured wait timeout, counted across the
    /// whole call rather than per contended object.
    pub fn lock_handles(&self, handles: &[Handle], requester: RequesterId) -> Result<LockGroupId, LockError> {
        self.lock_handles_timeout(handles, requester, self.shared.config.wait_timeout)
    }

    /// [`LockBroker::lock_handles`] with an explicit wait bound
    ///
    /// On any failure the locks this call took are released and the slot is
    /// returned to the table.
    pub fn lock_handles_timeout(
        &self,
        handles: &[Handle],
        requester: RequesterId,
        timeout: Duration,
    ) -> Result<LockGroupId, LockError> {
        let handles = self.ordered(handles);
        let shared = &*self.shared;
        let deadline = Instant::now().checked_add(timeout);

        let mut state = self.state();
        let Some(slot) = state.find_empty_slot(&shared.resolver) else {
            tracing::warn!(requester = %requester, "lock-group slots exhausted");
            return Err(LockError::ResourceExhausted(Resource::LockGroups));
        };
        let Some(id) = state.groups.open(slot, requester) else {
            tracing::warn!(requester = %requester, "lock-group ids exhausted");
            return Err(LockError::ResourceExhausted(Resource::LockGroups));
        };

        for &handle in &handles {
            let attempt = match state.try_acquire(slot, handle, requester, &shared.config, &shared.resolver) {
                Ok(attempt) => attempt,
                Err(err) => {
                    state.cleanup(slot, Cleanup::Unwind, &shared.resolver);
                    return Err(err);
                }
            };
            let Attempt::Queued { object, waiter, wake } = attempt else {
                continue;
            };

            loop {
                if state.claim_handoff(object, waiter, requester, slot) {
                    break;
                }
                let remaining = match deadline {
                    Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                    None => Duration::MAX,
                };
                if remaining.is_zero() {
                    state.abandon_wait(object, waiter);
                    state.cleanup(slot, Cleanup::Unwind, &shared.resolver);
                    tracing::warn!(handle = %handle, requester = %requester, ?timeout, "lock wait timed out");
                    return Err(LockError::Timeout {
                        handle,
                        waited: timeout,
                    });
                }
                let (guard, _) = wake
                    .wait_timeout(state, remaining)
                    .unwrap_or_else(|e| e.into_inner());
                state = guard;
            }
        }

        state.groups.slot_mut(slot).state = GroupState::Active;
        tracing::debug!(id = %id, requester = %requester, handles = handles.len(), "lock group granted");
        Ok(id)
    }

    /// Release a lock group now
    pub fn unlock_handles(&self, id: LockGroupId) -> Result<(), LockError> {
        let shared = &*self.shared;
        let mut state = self.state();
        let slot = state
            .groups
            .find(id, &[GroupState::Active, GroupState::NeedsCleanup])
            .ok_or(LockError::InvalidLockId(id))?;
        let mode = if state.groups.slot(slot).state == GroupState::Active {
            Cleanup::Unlock
        } else {
            Cleanup::Reclaim
        };
        state.cleanup(slot, mode, &shared.resolver);
        tracing::debug!(id = %id, "lock group unlocked");
        Ok(())
    }

    /// Release a lock group once `source` retires `timestamp`
    ///
    /// Unlocks immediately when the timestamp has already passed.
    pub fn unlock_on_timestamp<S>(&self, id: LockGroupId, timestamp: Timestamp, source: &S) -> Result<(), LockError>
    where
        S: TimestampSource + ?Sized,
    {
        let passed = source.has_passed(timestamp);
        {
            let shared = &*self.shared;
            let mut state = self.state();
            let slot = state
                .groups
                .find(id, &[GroupState::Active])
                .ok_or(LockError::InvalidLockId(id))?;
            if passed {
                state.cleanup(slot, Cleanup::Unlock, &shared.resolver);
                tracing::debug!(id = %id, timestamp, "timestamp already retired, lock group unlocked");
                return Ok(());
            }
            state.groups.slot_mut(slot).deferred = Some(Deferred {
                timestamp,
                device: source.device_kind(),
            });
        }

        tracing::debug!(id = %id, timestamp, device = %source.device_kind(), "lock group release deferred");
        let broker = Arc::downgrade(&self.shared);
        source.on_retire(
            timestamp,
            Box::new(move || {
                if let Some(shared) = broker.upgrade() {
                    LockBroker { shared }.wake_deferred(id, timestamp);
                }
            }),
        );
        Ok(())
    }

    fn wake_deferred(&self, id: LockGroupId, timestamp: Timestamp) -> bool {
        let mut state = self.state();
        let Some(slot) = state.groups.find(id, &[GroupState::Active]) else {
            return false;
        };
        if state.groups.slot(slot).deferred.map(|d| d.timestamp) != Some(timestamp) {
            return false;
        }
        state.wake_group(slot);
        tracing::debug!(id = %id, timestamp, "deferred lock group released");
        true
    }

    /// Release an active group's locks, leaving the slot for the next scan
    pub fn wakeup_group(&self, id: LockGroupId) -> Result<(), LockError> {
        let mut state = self.state();
        let slot = state
            .groups
            .find(id, &[GroupState::Active])
            .ok_or(LockError::InvalidLockId(id))?;
        state.wake_group(slot);
        Ok(())
    }

    /// Release every group deferred on `device` whose timestamp has passed
    pub fn timestamps_retired(&self, device: DeviceKind, retired: Timestamp) -> usize {
        let mut state = self.state();
        let due: Vec<usize> = state
            .groups
            .iter()
            .filter(|(_, g)| g.state == GroupState::Active)
            .filter(|(_, g)| {
                g.deferred
                    .is_some_and(|d| d.device == device && timestamp_passed(retired, d.timestamp))
            })
            .map(|(index, _)| index)
            .collect();
        for &slot in &due {
            state.wake_group(slot);
        }
        if !due.is_empty() {
            tracing::debug!(device = %device, retired, released = due.len(), "deferred lock groups released");
        }
        due.len()
    }

    /// Current holder of the object behind `handle`
    pub fn holder(&self, handle: Handle) -> Option<RequesterId> {
        let object = self.shared.resolver.lookup(handle)?;
        let holder = self.state().lookup_object(object).and_then(|lock| lock.holder);
        self.shared.resolver.release(object);
        holder
    }

    /// Requesters queued on the object behind `handle`
    pub fn waiter_count(&self, handle: Handle) -> usize {
        let Some(object) = self.shared.resolver.lookup(handle) else {
            return 0;
        };
        let count = self
            .state()
            .lookup_object(object)
            .map_or(0, LockObject::waiter_count);
        self.shared.resolver.release(object);
        count
    }

    /// State of the slot holding `id`, if any
    pub fn group_state(&self, id: LockGroupId) -> Option<GroupState> {
        let state = self.state();
        let found = state
            .groups
            .iter()
            .find(|(_, g)| g.id == Some(id))
            .map(|(_, g)| g.state);
        found
    }

    pub fn snapshot(&self) -> BrokerSnapshot {
        let state = self.state();
        let groups = state
            .groups
            .iter()
            .filter_map(|(slot, g)| {
                Some(GroupSnapshot {
                    slot,
                    id: g.id?,
                    state: g.state,
                    requester: g.requester,
                    handles: g.members.iter().map(|m| m.handle).collect(),
                    deferred: g.deferred.map(|d| DeferredSnapshot {
                        timestamp: d.timestamp,
                        device: d.device,
                    }),
                })
            })
            .collect();
        let mut objects: Vec<ObjectSnapshot> = state
            .objects
            .values()
            .map(|lock| ObjectSnapshot {
                handle: lock.handle,
                holder: lock.holder,
                waiters: lock.waiter_count(),
                memberships: lock.membership_count(),
            })
            .collect();
        objects.sort_by_key(|o| o.handle);
        BrokerSnapshot { groups, objects }
    }
}

impl<R: HandleResolver> std::fmt::Debug for LockBroker<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockBroker")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of the broker tables
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerSnapshot {
    pub groups: Vec<GroupSnapshot>,
    pub objects: Vec<ObjectSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub slot: usize,
    pub id: LockGroupId,
    pub state: GroupState,
    pub requester: Option<RequesterId>,
    pub handles: Vec<Handle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deferred: Option<DeferredSnapshot>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredSnapshot {
    pub timestamp: Timestamp,
    pub device: DeviceKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub handle: Handle,
    pub holder: Option<RequesterId>,
    pub waiters: usize,
    pub memberships: usize,
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
