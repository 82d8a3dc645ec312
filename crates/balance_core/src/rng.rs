//! Seeded pseudo-random sources.
//!
//! Reproducibility matters more than statistical quality here: the same
//! seed must give the same sequence on every platform, so the generator is a
//! plain multiplicative LCG on integers.

/// Source of uniform randomness injected into the combat engine.
pub trait RandomSource {
    /// Uniform value in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// True with probability `p` (clamped to `[0, 1]`).
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p.clamp(0.0, 1.0)
    }
}

/// Park–Miller minimal standard generator: `state = state * 48271 mod (2^31 - 1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    const MODULUS: u64 = 2_147_483_647;
    const MULTIPLIER: u64 = 48_271;

    /// Create a generator from any seed. A seed mapping to 0 is replaced by 1.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let state = seed % Self::MODULUS;
        Self {
            state: if state == 0 { 1 } else { state },
        }
    }

    /// Next raw state in `1..MODULUS`.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u64 {
        self.state = (self.state * Self::MULTIPLIER) % Self::MODULUS;
        self.state
    }
}

impl RandomSource for Lcg {
    fn next_f64(&mut self) -> f64 {
        (self.next() - 1) as f64 / (Self::MODULUS - 1) as f64
    }
}

/// Deterministic, position-based seed for cell `index` of a run seeded with `base`.
///
/// Pure function of its inputs, so cells can be computed in any order or in
/// parallel and still reproduce the same matrix.
#[must_use]
pub fn derive_cell_seed(base: u64, index: usize) -> u64 {
    // splitmix64 finalizer over the combined input
    let mut z = base
        .wrapping_add(0x9E37_79B9_7F4A_7C15)
        .wrapping_add((index as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
