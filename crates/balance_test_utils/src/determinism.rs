//! Determinism testing utilities.
//!
//! Provides a harness for verifying that sampling and matrix runs produce
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Balance runs must be reproducible: the same roster, seed and trial count
//! must yield the same artifact on every machine. Sources of
//! non-determinism include:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Sensitivity maps are `BTreeMap`s and cells are stored row-major.
//!
//! - **System randomness**: No calls to `rand()` without explicit seeds.
//!   Every trial draws from a seeded LCG.
//!
//! - **Thread scheduling**: Parallel cells derive their seed from their
//!   position, never from completion order.
//!
//! Values are compared through a digest of their bincode encoding, which is
//! exact for floats (bit patterns, not rounded text).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use serde::Serialize;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Digests from each run.
    pub hashes: Vec<u64>,
}

impl DeterminismResult {
    fn from_hashes(hashes: Vec<u64>) -> Self {
        Self {
            is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
            hashes,
        }
    }

    /// Get all unique digests (should be 1 for a deterministic computation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different digests.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Computation is non-deterministic!\n\
                 Runs: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Digest of a value's bincode encoding.
///
/// # Panics
///
/// Panics if the value cannot be encoded; test inputs are plain data.
pub fn bincode_digest<T: Serialize>(value: &T) -> u64 {
    let bytes = bincode::serialize(value).expect("test value must serialize");
    compute_hash(&bytes)
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Run a computation `runs` times and verify every result encodes identically.
///
/// # Example
///
/// ```ignore
/// use balance_test_utils::determinism::verify_determinism;
/// use balance_core::prelude::*;
///
/// let config = BalancerConfig::default();
/// let result = verify_determinism(5, || sample_matchup(&a, &b, 200, 42, &config));
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<T, F>(runs: usize, compute: F) -> DeterminismResult
where
    T: Serialize,
    F: Fn() -> T,
{
    let hashes = (0..runs).map(|_| bincode_digest(&compute())).collect();
    DeterminismResult::from_hashes(hashes)
}

/// Like [`verify_determinism`] but each run executes on its own scoped thread.
pub fn verify_parallel_determinism<T, F>(runs: usize, compute: F) -> DeterminismResult
where
    T: Serialize,
    F: Fn() -> T + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..runs)
            .map(|_| s.spawn(|| bincode_digest(&compute())))
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("determinism worker panicked"))
            .collect()
    });
    DeterminismResult::from_hashes(hashes)
}

/// Proptest strategies for balance properties.
pub mod strategies {
    use balance_core::stats::StatProfile;
    use proptest::prelude::*;

    /// HP in a playable range.
    pub fn arb_hp() -> impl Strategy<Value = f64> {
        50.0..2000.0_f64
    }

    /// Damage per hit in a playable range.
    pub fn arb_damage() -> impl Strategy<Value = f64> {
        1.0..200.0_f64
    }

    /// Armor value, including zero.
    pub fn arb_armor() -> impl Strategy<Value = f64> {
        0.0..500.0_f64
    }

    /// Percentage stat in `[0, 100]`.
    pub fn arb_percent() -> impl Strategy<Value = f64> {
        0.0..=100.0_f64
    }

    /// Profile exercising the main offensive and defensive stats.
    pub fn arb_profile() -> impl Strategy<Value = StatProfile> {
        (
            arb_hp(),
            arb_damage(),
            arb_armor(),
            0.0..80.0_f64,
            0.0..50.0_f64,
            0.0..90.0_f64,
            0.0..30.0_f64,
            0.0..10.0_f64,
        )
            .prop_map(
                |(hp, damage, armor, evasion, crit_chance, resistance, lifesteal, regen)| {
                    StatProfile {
                        armor,
                        evasion,
                        crit_chance,
                        resistance,
                        lifesteal,
                        regen,
                        ..StatProfile::with_hp_damage(hp, damage)
                    }
                },
            )
    }
}
