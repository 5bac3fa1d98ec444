//! Version minting.

use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Mints the monotonically nondecreasing versions announced per cycle.
pub trait VersionMinter: Send + Sync {
    fn mint(&self) -> u64;
}

/// The default minter: strictly increasing wall-clock milliseconds.
///
/// Two mints within the same millisecond (or across a clock step
/// backwards) advance by one instead of repeating.
#[derive(Default)]
pub struct WallClockVersionMinter {
    last: Mutex<u64>,
}

impl WallClockVersionMinter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VersionMinter for WallClockVersionMinter {
    fn mint(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let mut last = self.last.lock();
        *last = now.max(*last + 1);
        *last
    }
}

/// A deterministic counter minter for tests and replay harnesses.
#[derive(Default)]
pub struct SequentialVersionMinter {
    next: Mutex<u64>,
}

impl SequentialVersionMinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting from `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: Mutex::new(first.saturating_sub(1)),
        }
    }
}

impl VersionMinter for SequentialVersionMinter {
    fn mint(&self) -> u64 {
        let mut next = self.next.lock();
        *next += 1;
        *next
    }
}
