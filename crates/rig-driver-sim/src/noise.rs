//! Smooth 1-D noise for the velocity waveform.
//!
//! [`NoiseSource`] is one-dimensional gradient (Perlin) noise sampled along a
//! synthetic time cursor. Each call to [`NoiseSource::next`] advances the cursor
//! by a fixed increment, so consecutive values vary smoothly instead of jumping
//! like white noise.

use crate::common::SimRng;

/// Cursor advance per sample
pub const DEFAULT_CURSOR_INCREMENT: f64 = 0.1;

/// Upper bound of the random starting cursor
const CURSOR_START_MAX: u32 = 1000;

const TABLE_SIZE: usize = 256;

/// Stateful gradient noise generator.
#[derive(Debug, Clone)]
pub struct NoiseSource {
    /// Doubled permutation table, avoids wrapping the lattice index
    permutation: [u8; TABLE_SIZE * 2],
    cursor: f64,
    increment: f64,
}

impl NoiseSource {
    /// Create a noise source drawing its permutation and start cursor from `rng`.
    pub fn new(rng: &SimRng) -> Self {
        Self::with_increment(rng, DEFAULT_CURSOR_INCREMENT)
    }

    /// Create a deterministic noise source from a seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(&SimRng::new(Some(seed)))
    }

    pub fn with_increment(rng: &SimRng, increment: f64) -> Self {
        let mut table: Vec<u8> = (0..TABLE_SIZE).map(|i| i as u8).collect();
        rng.shuffle(&mut table);

        let mut permutation = [0u8; TABLE_SIZE * 2];
        for (i, slot) in permutation.iter_mut().enumerate() {
            *slot = table[i % TABLE_SIZE];
        }

        Self {
            permutation,
            cursor: f64::from(rng.gen_range(0..=CURSOR_START_MAX)),
            increment,
        }
    }

    /// Advance the cursor and return the noise value there, within [-1, 1].
    pub fn next(&mut self) -> f64 {
        self.cursor += self.increment;
        self.sample(self.cursor)
    }

    /// Current position of the time cursor.
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Evaluate the noise function at `x` without moving the cursor.
    pub fn sample(&self, x: f64) -> f64 {
        let floor = x.floor();
        let lattice = (floor as i64).rem_euclid(TABLE_SIZE as i64) as usize;
        let offset = x - floor;

        let left = self.gradient(lattice) * offset;
        let right = self.gradient(lattice + 1) * (offset - 1.0);
        let blended = lerp(fade(offset), left, right);

        // A 1-D lattice cell peaks at +/-0.5
        (blended * 2.0).clamp(-1.0, 1.0)
    }

    fn gradient(&self, index: usize) -> f64 {
        let hash = self.permutation[index];
        f64::from(hash) / 255.0 * 2.0 - 1.0
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_bounded() {
        let mut noise = NoiseSource::seeded(42);
        for _ in 0..10_000 {
            let value = noise.next();
            assert!((-1.0..=1.0).contains(&value), "out of range: {}", value);
        }
    }

    #[test]
    fn test_deterministic_for_seed_and_call_count() {
        let mut a = NoiseSource::seeded(1234);
        let mut b = NoiseSource::seeded(1234);
        for _ in 0..500 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn test_cursor_advances_by_increment() {
        let mut noise = NoiseSource::seeded(3);
        let start = noise.cursor();
        assert!((0.0..=1000.0).contains(&start));
        noise.next();
        noise.next();
        assert!((noise.cursor() - (start + 0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_signal_is_smooth() {
        let mut noise = NoiseSource::seeded(99);
        let mut previous = noise.next();
        for _ in 0..1000 {
            let value = noise.next();
            // Slope stays below 4.9 per unit before the x2 scaling
            assert!((value - previous).abs() < 1.0);
            previous = value;
        }
    }

    #[test]
    fn test_zero_on_lattice_points() {
        let noise = NoiseSource::seeded(5);
        for x in 0..20 {
            assert_eq!(noise.sample(f64::from(x)), 0.0);
        }
    }

    #[test]
    fn test_signal_is_not_constant() {
        let mut noise = NoiseSource::seeded(8);
        let values: Vec<f64> = (0..200).map(|_| noise.next()).collect();
        let max = values.iter().cloned().fold(f64::MIN, f64::max);
        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        assert!(max - min > 0.1);
    }
}
