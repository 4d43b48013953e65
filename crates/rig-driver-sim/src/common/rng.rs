//! Shared random source for the simulators.
//!
//! Waveform noise, outlier injection, camera timing jitter and picture
//! metadata all draw from a [`SimRng`]. Seeding it makes a whole simulated
//! run repeatable; leaving the seed out draws one from the OS.

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::sync::Mutex;

/// ChaCha8 generator behind a mutex, usable through `&self`.
pub struct SimRng {
    state: Mutex<ChaCha8Rng>,
}

impl SimRng {
    pub fn new(seed: Option<u64>) -> Self {
        let generator = seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
        Self {
            state: Mutex::new(generator),
        }
    }

    fn draw<T>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
        // A panic mid-draw leaves the generator state usable
        let mut generator = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut generator)
    }

    /// `true` with probability `p`; values outside `0..=1` saturate.
    pub fn chance(&self, p: f64) -> bool {
        match p {
            p if p.is_nan() || p <= 0.0 => false,
            p if p >= 1.0 => true,
            p => self.draw(|g| g.gen_bool(p)),
        }
    }

    pub fn next_u64(&self) -> u64 {
        self.draw(|g| g.r#gen())
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&self) -> f64 {
        self.draw(|g| g.r#gen())
    }

    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.draw(|g| g.gen_range(range))
    }

    /// One element of `items`, `None` when it is empty.
    pub fn choose<T: Copy>(&self, items: &[T]) -> Option<T> {
        self.draw(|g| items.choose(g).copied())
    }

    pub fn shuffle<T>(&self, items: &mut [T]) {
        self.draw(|g| items.shuffle(g));
    }

    /// Independent generator seeded by one draw from this one.
    pub fn fork(&self) -> SimRng {
        SimRng::new(Some(self.next_u64()))
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for SimRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimRng").finish_non_exhaustive()
    }
}
