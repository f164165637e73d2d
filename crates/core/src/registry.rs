// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object handle resolution
//!
//! The broker never owns buffer objects. It resolves caller handles through a
//! [`HandleResolver`], holding one reference per lock-group membership.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Caller-visible integer naming an object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(pub u32);

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of an object, independent of how many handles name it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// Maps handles to referenced objects
pub trait HandleResolver: Send + Sync {
    /// Resolve `handle`, taking a reference on the object
    fn lookup(&self, handle: Handle) -> Option<ObjectId>;

    /// Drop a reference taken by [`HandleResolver::lookup`]
    fn release(&self, object: ObjectId);
}

impl<R: HandleResolver + ?Sized> HandleResolver for Arc<R> {
    fn lookup(&self, handle: Handle) -> Option<ObjectId> {
        (**self).lookup(handle)
    }

    fn release(&self, object: ObjectId) {
        (**self).release(object)
    }
}

#[derive(Default)]
struct RegistryState {
    next_handle: u32,
    next_object: u64,
    handles: HashMap<Handle, ObjectId>,
    refs: HashMap<ObjectId, usize>,
}

impl RegistryState {
    fn unref(&mut self, object: ObjectId) {
        let Some(count) = self.refs.get_mut(&object) else {
            tracing::error!(object = object.0, "release of unreferenced object");
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.refs.remove(&object);
            tracing::debug!(object = object.0, "object freed");
        }
    }
}

/// In-memory handle table with per-object reference counts
///
/// Each handle holds one reference on its object; closing the handle drops it.
#[derive(Clone, Default)]
pub struct ObjectRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a new object and return a handle to it
    pub fn create(&self) -> Handle {
        let mut state = self.state();
        state.next_handle += 1;
        state.next_object += 1;
        let handle = Handle(state.next_handle);
        let object = ObjectId(state.next_object);
        state.handles.insert(handle, object);
        state.refs.insert(object, 1);
        handle
    }

    /// Close a handle, dropping its reference
    pub fn close(&self, handle: Handle) -> bool {
        let mut state = self.state();
        match state.handles.remove(&handle) {
            Some(object) => {
                state.unref(object);
                true
            }
            None => false,
        }
    }

    /// References currently held on the object behind `handle`
    pub fn refcount(&self, handle: Handle) -> usize {
        let state = self.state();
        state
            .handles
            .get(&handle)
            .and_then(|object| state.refs.get(object))
            .copied()
            .unwrap_or(0)
    }

    /// Number of objects with at least one reference
    pub fn live_objects(&self) -> usize {
        self.state().refs.len()
    }
}

impl HandleResolver for ObjectRegistry {
    fn lookup(&self, handle: Handle) -> Option<ObjectId> {
        let mut state = self.state();
        let object = *state.handles.get(&handle)?;
        *state.refs.entry(object).or_insert(0) += 1;
        Some(object)
    }

    fn release(&self, object: ObjectId) {
        self.state().unref(object);
    }
}
