//! System-wide constants for the Paydesk settlement engine.

/// Fractional digits kept for every currency amount.
pub const CURRENCY_SCALE: u32 = 2;

/// Default time a caller waits for a transaction's critical section (milliseconds).
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Default width of the duplicate-suppression recording bucket (seconds).
pub const DEFAULT_DEDUP_BUCKET_SECS: i64 = 1;

/// Default capacity of the settlement event broadcast channel.
///
/// Slow subscribers that fall further behind than this lose the oldest events.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
