//! Deterministic jitter RNG hierarchy.
//!
//! A master seed generates a sub-seed for each `(exchange, symbol)` pair via
//! BLAKE3 hashing. Derivation is independent of worker scheduling order, so a
//! seeded run draws the same backoff and pacing delays for every symbol
//! regardless of how many workers run or which finishes first.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Deterministic RNG hierarchy for retry and pacing jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterSeeds {
    master_seed: u64,
}

impl JitterSeeds {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    /// Fresh hierarchy seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive the sub-seed for one `(exchange, symbol)` pair.
    pub fn sub_seed(&self, exchange: &str, symbol: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(exchange.as_bytes());
        // Separator keeps ("AB", "C") and ("A", "BC") apart.
        hasher.update(&[0]);
        hasher.update(symbol.as_bytes());
        let hash = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Seeded StdRng for one `(exchange, symbol)` pair.
    pub fn rng_for(&self, exchange: &str, symbol: &str) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(exchange, symbol))
    }

    /// Seeded StdRng for a worker slot (inter-symbol pacing).
    pub fn rng_for_worker(&self, exchange: &str, worker: usize) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(exchange, &format!("worker#{worker}")))
    }
}
