// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wraparound-safe timestamp ordering
//!
//! Producers hand out 32-bit completion counters that wrap. Two timestamps are
//! ordered by the sign of their wrapping difference, so `0` sorts after
//! `0xFFFF_FFFF`.

use std::cmp::Ordering;

/// A 32-bit completion counter reported by a timestamp producer
pub type Timestamp = u32;

/// Distance at which the signed difference stops being meaningful
const HALF_RANGE: u32 = 0x8000_0000;

/// Compare two timestamps by the sign of `(a - b) as i32`
///
/// Values exactly half the counter range apart have no wraparound order; they
/// fall back to numeric order so the comparison stays antisymmetric.
pub fn timestamp_cmp(a: Timestamp, b: Timestamp) -> Ordering {
    match a.wrapping_sub(b) {
        0 => Ordering::Equal,
        HALF_RANGE => a.cmp(&b),
        delta => (delta as i32).cmp(&0),
    }
}

/// The later of two timestamps under the wraparound order
pub fn timestamp_max(a: Timestamp, b: Timestamp) -> Timestamp {
    match timestamp_cmp(a, b) {
        Ordering::Less => b,
        _ => a,
    }
}

/// True once `current` has reached or passed `target`
pub fn timestamp_passed(current: Timestamp, target: Timestamp) -> bool {
    timestamp_cmp(current, target) != Ordering::Less
}

#[cfg(test)]
#[path = "timestamp_tests.rs"]
mod tests;
