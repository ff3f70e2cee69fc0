//! Named, independently seedable RNG streams.
//!
//! Each stream is seeded from `base_seed + stable_hash(stream_name)`, so
//! `reseed_all` is a pure function of the base seed and every stream name
//! ever touched reproduces identically.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// Canonical stream names used across the core.
pub const STREAM_COMBAT: &str = "combat";
pub const STREAM_PHASES: &str = "phases";
pub const STREAM_GROUND: &str = "ground";
pub const STREAM_SPACE: &str = "space";

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in s.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn derive_seed(stream_name: &str, base_seed: u64) -> u64 {
    base_seed.wrapping_add(fnv1a(stream_name))
}

/// Owns one named `ChaCha8Rng` per stream, lazily created on first access.
#[derive(Debug, Clone)]
pub struct RngRegistry {
    base_seed: u64,
    streams: HashMap<String, ChaCha8Rng>,
}

impl RngRegistry {
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed, streams: HashMap::new() }
    }

    /// Returns the stream, creating and seeding it deterministically on
    /// first access.
    pub fn stream(&mut self, name: &str) -> &mut ChaCha8Rng {
        self.streams
            .entry(name.to_string())
            .or_insert_with(|| ChaCha8Rng::seed_from_u64(derive_seed(name, self.base_seed)))
    }

    /// Reseeds every stream touched so far (and remembers the new base seed
    /// for streams created afterward). Used for property test 7 and for
    /// deterministic replay from a recorded command stream.
    pub fn reseed_all(&mut self, base_seed: u64) {
        self.base_seed = base_seed;
        let names: Vec<String> = self.streams.keys().cloned().collect();
        for name in names {
            let seed = derive_seed(&name, base_seed);
            self.streams.insert(name, ChaCha8Rng::seed_from_u64(seed));
        }
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = RngRegistry::new(42);
        let mut b = RngRegistry::new(42);
        let xs: Vec<u32> = (0..5).map(|_| a.stream(STREAM_COMBAT).gen()).collect();
        let ys: Vec<u32> = (0..5).map(|_| b.stream(STREAM_COMBAT).gen()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn distinct_streams_diverge() {
        let mut reg = RngRegistry::new(42);
        let a: u32 = reg.stream(STREAM_COMBAT).gen();
        let b: u32 = reg.stream(STREAM_PHASES).gen();
        assert_ne!(a, b);
    }

    #[test]
    fn reseed_all_reproduces_sequence() {
        let mut reg = RngRegistry::new(1);
        let _: u32 = reg.stream(STREAM_GROUND).gen();
        let first: Vec<u32> = (0..3).map(|_| reg.stream(STREAM_GROUND).gen()).collect();

        reg.reseed_all(1);
        let second: Vec<u32> = (0..3).map(|_| reg.stream(STREAM_GROUND).gen()).collect();
        assert_eq!(first, second);
    }
}
