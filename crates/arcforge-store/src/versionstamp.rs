//! Versionstamps: the store's notion of "when was this key last written".

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A single global, monotonically increasing counter bumped once per
/// successful `AtomicCommit`, then stamped onto every key the commit
/// touched.
///
/// Real transactional KV stores (FoundationDB and its relatives) assign a
/// versionstamp per-key derived from the commit's position in the
/// transaction log; this store simplifies that to one counter for the
/// whole keyspace. The spec's optimistic-concurrency contract never
/// distinguishes between the two — preconditions only ever compare
/// "this versionstamp" or "absent" — so the simplification is exact at
/// the interface this crate exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Versionstamp(pub u64);

/// Generates strictly increasing versionstamps, one per committed
/// transaction.
#[derive(Debug, Default)]
pub struct VersionClock {
    next: AtomicU64,
}

impl VersionClock {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocates the next versionstamp. Called exactly once per
    /// successful commit, while holding the store's write lock.
    pub fn tick(&self) -> Versionstamp {
        Versionstamp(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_clock_strictly_increases() {
        let clock = VersionClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert!(b.0 > a.0);
    }
}
