// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for fences, the lock broker and configuration

use crate::broker::LockGroupId;
use crate::device::ContextId;
use crate::fence::FenceFd;
use crate::registry::Handle;
use std::time::Duration;
use thiserror::Error;

/// Errors from timelines, fences and devices
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("timeline {0} has been destroyed")]
    TimelineDestroyed(String),
    #[error("invalid fence fd {0}")]
    InvalidFence(FenceFd),
    #[error("invalid context {0}")]
    InvalidContext(ContextId),
    #[error("fence {0} signaled with an error")]
    FenceError(String),
    #[error("timed out after {0:?} waiting for fence")]
    Timeout(Duration),
}

/// A fixed-capacity table the broker ran out of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// The lock-group table
    LockGroups,
    /// An object's membership records
    Memberships(Handle),
    /// An object's waiter records
    Waiters(Handle),
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::LockGroups => write!(f, "lock-group slots"),
            Resource::Memberships(handle) => write!(f, "membership records of handle {}", handle),
            Resource::Waiters(handle) => write!(f, "wait entries of handle {}", handle),
        }
    }
}

/// Errors from the multi-object lock broker
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("invalid object handle {0}")]
    InvalidHandle(Handle),
    #[error("invalid lock id {0}")]
    InvalidLockId(LockGroupId),
    #[error("no free {0}")]
    ResourceExhausted(Resource),
    #[error("timed out after {waited:?} waiting for handle {handle}")]
    Timeout { handle: Handle, waited: Duration },
}

impl LockError {
    /// True for errors that name an unknown handle or lock id
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, LockError::InvalidHandle(_) | LockError::InvalidLockId(_))
    }
}

/// Errors loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
