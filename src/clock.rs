//! Wall-clock helper for stamping commands off the hot path.
//!
//! The matching thread never reads a clock — timestamps ride in on inbound
//! commands. Feed drivers and benchmarks use this to produce them.

use chrono::Utc;

use crate::types::Timestamp;

/// Nanoseconds since the Unix epoch.
///
/// Saturates rather than panicking past the year 2262 — by then the i64
/// nanosecond range is somebody else's problem.
pub fn now_nanos() -> Timestamp {
    Utc::now()
        .timestamp_nanos_opt()
        .map(|n| n.max(0) as u64)
        .unwrap_or(u64::MAX)
}
