// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::device::DeviceKind;
use crate::timestamp::Timestamp;

/// Callback run once a timestamp retires
pub type RetireCallback = Box<dyn FnOnce() + Send + 'static>;

/// A producer of retiring timestamps that deferred unlocks can wait on
pub trait TimestampSource {
    fn device_kind(&self) -> DeviceKind;

    /// Whether `timestamp` has already retired
    fn has_passed(&self, timestamp: Timestamp) -> bool;

    /// Run `callback` once `timestamp` retires.
    ///
    /// The callback must not run under any lock the broker could be
    /// waiting on; it may run before this returns if the timestamp has
    /// already passed.
    fn on_retire(&self, timestamp: Timestamp, callback: RetireCallback);
}
