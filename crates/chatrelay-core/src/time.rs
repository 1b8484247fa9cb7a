//! Server clock used to stamp inbound messages.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Source of "now" in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Settable clock for deterministic timestamps.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_unix: i64) -> Self {
        Self {
            now: AtomicI64::new(now_unix),
        }
    }

    pub fn set(&self, now_unix: i64) {
        self.now.store(now_unix, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
