//! Randomized down-sampling of the tick stream
//!
//! The tick stream is split into consecutive windows of `factor` ticks. At the start
//! of each window a position in `[0, factor)` is drawn from a seeded generator, and
//! only the tick at that position is admitted. The generator and the factor are
//! replaced together, so a window is never judged by one configuration's factor and
//! another's generator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Sampling filter state
#[derive(Debug, Clone)]
pub struct Sampler {
    factor: u64,
    rng: StdRng,
    position: u64,
    selected: u64,
}

impl Sampler {
    /// Sampler that admits every tick
    pub fn disabled() -> Self {
        Self::with_factor(0, 0)
    }

    /// Sampler for one tick in every `factor`; a factor of 0 admits everything
    pub fn with_factor(factor: u64, seed: u64) -> Self {
        Self {
            factor,
            rng: StdRng::seed_from_u64(seed),
            position: 0,
            selected: 0,
        }
    }

    /// Sampler for `sample_interval` over ticks spaced `base_interval` apart.
    ///
    /// The factor is the integer quotient, so any sample interval shorter than the base
    /// interval (including zero) disables sampling.
    pub fn for_interval(sample_interval: Duration, base_interval: Duration, seed: u64) -> Self {
        Self::with_factor(sampling_factor(sample_interval, base_interval), seed)
    }

    pub fn factor(&self) -> u64 {
        self.factor
    }

    pub fn is_enabled(&self) -> bool {
        self.factor != 0
    }

    /// Decide whether the next tick is forwarded
    pub fn admit(&mut self) -> bool {
        if self.factor == 0 {
            return true;
        }

        let slot = self.position % self.factor;
        if slot == 0 {
            self.selected = self.rng.random_range(0..self.factor);
        }
        self.position = self.position.wrapping_add(1);

        slot == self.selected
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::disabled()
    }
}

/// `floor(sample_interval / base_interval)`, saturating at `u64::MAX`
pub fn sampling_factor(sample_interval: Duration, base_interval: Duration) -> u64 {
    let base = base_interval.as_nanos();
    if base == 0 {
        return 0;
    }
    u64::try_from(sample_interval.as_nanos() / base).unwrap_or(u64::MAX)
}
