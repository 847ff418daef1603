//! Construction parameters and the table's fixed limits.

use crate::error::{MapError, Result};
use std::sync::OnceLock;

/// Capacity used when none is given. Must be a power of two.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Largest table length. Requests above it are clamped.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;

/// Load factor used when none is given.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Chain length at which a bucket of ordered keys becomes a tree bin.
/// A split half smaller than this is flattened back into a chain.
pub const TREE_THRESHOLD: usize = 16;

/// Environment variable that turns on per-instance hash seeds for maps
/// built from `MapConfig::default()`.
pub const RANDOM_SEED_ENV: &str = "HYBRID_HASHMAP_RANDOM_SEED";

fn random_seed_from_env() -> bool {
    static FLAG: OnceLock<bool> = OnceLock::new();
    *FLAG.get_or_init(|| {
        std::env::var(RANDOM_SEED_ENV)
            .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false)
    })
}

/// Configuration for a `HybridHashMap`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    /// Requested capacity; rounded up to a power of two on first insert.
    pub initial_capacity: usize,
    /// Ratio of entries to capacity that triggers a doubling.
    pub load_factor: f32,
    /// XOR a random per-instance seed into every hash.
    pub random_seed: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
            random_seed: random_seed_from_env(),
        }
    }
}

impl MapConfig {
    pub fn new(initial_capacity: usize, load_factor: f32) -> Self {
        Self {
            initial_capacity,
            load_factor,
            ..Self::default()
        }
    }

    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn with_load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    pub fn with_random_seed(mut self, random_seed: bool) -> Self {
        self.random_seed = random_seed;
        self
    }

    /// Rejects a non-positive or NaN load factor.
    pub fn validate(&self) -> Result<()> {
        if self.load_factor <= 0.0 || self.load_factor.is_nan() {
            return Err(MapError::IllegalLoadFactor(self.load_factor));
        }
        Ok(())
    }

    /// Requested capacity after clamping to `MAXIMUM_CAPACITY`.
    pub(crate) fn clamped_capacity(&self) -> usize {
        self.initial_capacity.min(MAXIMUM_CAPACITY)
    }

    /// Seed mixed into hashes, or zero when seeding is off.
    pub(crate) fn draw_seed(&self) -> u32 {
        if self.random_seed {
            fastrand::u32(1..)
        } else {
            0
        }
    }
}
