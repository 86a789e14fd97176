use std::time::Duration;

/// Default cap on how many waiters are surfaced per book at once.
pub const DEFAULT_NOTIFY_LIMIT: usize = 3;

/// Hold length used when a request does not name one.
pub const DEFAULT_HOLD: Duration = Duration::from_secs(60 * 60);

/// Shortest hold a request may ask for.
pub const MIN_HOLD: Duration = Duration::from_secs(60);

/// Longest hold a request may ask for (7 days).
pub const MAX_HOLD: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Waiters beyond this are turned away instead of queued.
pub const MAX_WAITLIST_LEN: usize = 10_000;

/// Capacity of each per-book broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Max bytes in one wire request line.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// How long shutdown waits for open connections to finish.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
