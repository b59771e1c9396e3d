//! Sources of "now" for expiry decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Supplies the current time as milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
        // Before 1970 only happens on a badly misconfigured machine.
        u64::try_from(nanos / 1_000_000).unwrap_or(0)
    }
}

/// A clock that only moves when told to. Clones share the same time, so a copy kept by a test
/// can advance the clock inside a store.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(now_millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now_millis)),
        }
    }

    pub fn set(&self, now_millis: u64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
