//! Deterministic random sources
//!
//! Two generators live here and they are not interchangeable:
//!
//! - [`hash_rand`] / [`HashRng`]: a stateless trigonometric hash, `frac(sin(seed) * 10000)`.
//!   Used wherever a value must be addressable by seed alone (table picks, lyric words).
//! - [`StreamRng`]: a small linear-congruential stream (`s = (s * 9301 + 49297) mod 233280`)
//!   whose output depends on how many values were drawn before.
//!
//! Both implement [`RandomSource`] for callers that only need "a float in [0, 1)".

use serde::{Deserialize, Serialize};

const LCG_MUL: u64 = 9301;
const LCG_INC: u64 = 49297;
const LCG_MOD: u64 = 233_280;

/// Distance between the seeds of two section occurrences within one stream
pub const SECTION_STRIDE: i64 = 10_000;

/// Distance between the seeds of two consecutive notes during humanization
pub const NOTE_STRIDE: i64 = 1_000;

/// Stateless hash in [0, 1)
pub fn hash_rand(seed: i64) -> f64 {
    let x = (seed as f64).sin() * 10_000.0;
    let frac = x - x.floor();
    // frac can round up to exactly 1.0 for tiny negative x
    if frac >= 1.0 { 0.0 } else { frac }
}

/// Index into a table of `len` entries using the hash of `seed`.
///
/// Floors, never rounds, and clamps to `len - 1`. `len` must be non-zero.
pub fn choice_index(len: usize, seed: i64) -> usize {
    debug_assert!(len > 0, "choice over an empty table");
    ((hash_rand(seed) * len as f64).floor() as usize).min(len.saturating_sub(1))
}

/// Pick an entry of a non-empty table by seed
pub fn choice<T>(items: &[T], seed: i64) -> &T {
    &items[choice_index(items.len(), seed)]
}

/// Anything that can hand out floats in [0, 1)
pub trait RandomSource {
    fn next_f64(&mut self) -> f64;

    /// True with probability `p`
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform integer in `[0, n)`; `n` must be non-zero
    fn below(&mut self, n: usize) -> usize {
        ((self.next_f64() * n as f64).floor() as usize).min(n.saturating_sub(1))
    }

    /// Uniform pick from a non-empty slice
    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T
    where
        Self: Sized,
    {
        &items[self.below(items.len())]
    }

    /// Uniform float in `[low, high)`
    fn range(&mut self, low: f64, high: f64) -> f64 {
        low + self.next_f64() * (high - low)
    }
}

/// [`hash_rand`] walked over consecutive seeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRng {
    seed: i64,
}

impl HashRng {
    pub fn new(seed: i64) -> Self {
        Self { seed }
    }
}

impl RandomSource for HashRng {
    fn next_f64(&mut self) -> f64 {
        let value = hash_rand(self.seed);
        self.seed = self.seed.wrapping_add(1);
        value
    }
}

/// Linear-congruential stream, deterministic for a given seed and call count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRng {
    state: u64,
}

impl StreamRng {
    pub fn new(seed: i64) -> Self {
        Self {
            state: seed.rem_euclid(LCG_MOD as i64) as u64,
        }
    }
}

impl RandomSource for StreamRng {
    fn next_f64(&mut self) -> f64 {
        self.state = (self.state * LCG_MUL + LCG_INC) % LCG_MOD;
        self.state as f64 / LCG_MOD as f64
    }
}

/// Independent sub-generators of one generation pass.
///
/// Each stream owns a disjoint seed band so two generators never share a seed
/// for the same section and step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stream {
    Bass,
    Lead,
    Drums,
    Pad,
    Effects,
    Lyrics,
    Meter,
    Groove,
    Atmosphere,
}

impl Stream {
    const BAND: i64 = 100_000_000;

    fn salt(self) -> i64 {
        let band = match self {
            Self::Bass => 1,
            Self::Lead => 2,
            Self::Drums => 3,
            Self::Pad => 4,
            Self::Effects => 5,
            Self::Lyrics => 6,
            Self::Meter => 7,
            Self::Groove => 8,
            Self::Atmosphere => 9,
        };
        band * Self::BAND
    }
}

/// `seed + stream band + section_index * SECTION_STRIDE + step`
pub fn derive_seed(seed: i64, stream: Stream, section_index: usize, step: i64) -> i64 {
    seed.wrapping_add(stream.salt())
        .wrapping_add((section_index as i64).wrapping_mul(SECTION_STRIDE))
        .wrapping_add(step)
}
