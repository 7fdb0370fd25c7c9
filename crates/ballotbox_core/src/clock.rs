//! Timestamp sources for `created_at` fields.

use crate::model::Timestamp;
use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies creation timestamps in nanoseconds since the Unix epoch.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall clock. Returns 0 if the system time is before the epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

/// Constant clock for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
