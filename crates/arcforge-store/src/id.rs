//! Sortable opaque identifiers.
//!
//! Every entity id in spec.md (`userId`, `entryId`, `roomId`, `gameId`,
//! `tokenId`) is an opaque string, but §6 relies on them sorting in
//! creation order for stable listings. A ULID-shaped id — a millisecond
//! timestamp prefix followed by random bits — gives us both: lexicographic
//! string order matches creation order, and collisions within the same
//! millisecond are resolved by the random suffix.

use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

const RANDOM_SUFFIX_LEN: usize = 16;

/// Generates sortable ids. Cheap to construct; holds no state worth
/// sharing beyond a per-process counter that breaks ties within the same
/// millisecond from the same generator.
#[derive(Debug, Default)]
pub struct IdGenerator {
    tie_breaker: AtomicU16,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            tie_breaker: AtomicU16::new(0),
        }
    }

    /// Generates a new id: a 12-hex-digit millisecond timestamp, a 4-hex
    /// tie-breaker, then random hex padding. Always `12 + 4 + 16` = 32 hex
    /// characters.
    pub fn generate(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the unix epoch")
            .as_millis();
        let tie = self.tie_breaker.fetch_add(1, Ordering::Relaxed);

        let mut out = format!("{millis:012x}{tie:04x}");
        let mut rng = rand::rng();
        for _ in 0..RANDOM_SUFFIX_LEN {
            let nibble: u8 = rng.random_range(0..16);
            out.push(std::char::from_digit(nibble as u32, 16).unwrap());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let gen = IdGenerator::new();
        let a = gen.generate();
        let b = gen.generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_ids_sort_in_creation_order_within_generator() {
        let gen = IdGenerator::new();
        let mut ids = Vec::new();
        for _ in 0..50 {
            ids.push(gen.generate());
        }
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_generated_id_length() {
        let gen = IdGenerator::new();
        assert_eq!(gen.generate().len(), 32);
    }
}
