// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fencelock-core: buffer-fence synchronization and multi-object locking
//!
//! This crate provides:
//! - A wraparound-safe timestamp comparator
//! - Timelines, fence points, and sync fences with an async wait bridge
//! - Devices that retire timestamps and signal fence events
//! - A multi-object lock broker with timestamp-deferred release

pub mod timestamp;
pub mod timeline;
pub mod fence;
pub mod event;
pub mod device;
pub mod registry;
pub mod broker;
pub mod config;
pub mod error;

// Re-exports
pub use broker::{
    BrokerSnapshot, GroupSnapshot, GroupState, LockBroker, LockGroupId, ObjectSnapshot,
    RequesterId, RetireCallback, TimestampSource,
};
pub use config::{BrokerConfig, HandleOrder};
pub use device::{ContextId, Device, DeviceKind, OwnerId};
pub use error::{ConfigError, LockError, Resource, SyncError};
pub use event::{EventKind, EventQueue};
pub use fence::{AsyncWaiter, FenceFd, FenceStatus, FenceTable, SyncFence};
pub use registry::{Handle, HandleResolver, ObjectId, ObjectRegistry};
pub use timeline::{FencePoint, PointStatus, Timeline};
pub use timestamp::{timestamp_cmp, timestamp_max, timestamp_passed, Timestamp};
