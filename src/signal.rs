//! Signal processing for velocity series.
//!
//! Pure functions: smoothing, integration and rounding for reporting.

use crate::error::{RigError, RigResult};
use std::collections::VecDeque;

/// Decimal places of reported displacements
pub const DISPLACEMENT_DECIMAL_PLACES: u32 = 3;

/// Trailing moving average over a fixed window.
///
/// Emits one value per full window, so `n` inputs yield `n - window + 1`
/// outputs.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window_size: usize,
    buffer: VecDeque<f64>,
}

impl MovingAverage {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            buffer: VecDeque::with_capacity(window_size),
        }
    }

    /// Push a sample, returning the window mean once the window is full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.buffer.push_back(value);
        if self.buffer.len() > self.window_size {
            self.buffer.pop_front();
        }
        if self.window_size > 0 && self.buffer.len() == self.window_size {
            Some(self.buffer.iter().sum::<f64>() / self.window_size as f64)
        } else {
            None
        }
    }
}

/// Smooth `samples` with a trailing moving average of `window` samples.
///
/// Shorter inputs than the window (and `window == 0`) are returned unchanged.
pub fn moving_average(samples: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || samples.len() < window {
        return samples.to_vec();
    }
    let mut filter = MovingAverage::new(window);
    samples.iter().filter_map(|&v| filter.push(v)).collect()
}

/// Area under `samples` spaced `dt` apart, by the trapezoidal rule.
///
/// Fails with `InsufficientData` for fewer than two samples.
pub fn integrate_trapezoid(samples: &[f64], dt: f64) -> RigResult<f64> {
    if samples.len() < 2 {
        return Err(RigError::InsufficientData {
            samples: samples.len(),
        });
    }
    Ok(samples
        .windows(2)
        .map(|pair| 0.5 * (pair[0] + pair[1]) * dt)
        .sum())
}

/// Trapezoidal displacement rounded to [`DISPLACEMENT_DECIMAL_PLACES`].
pub fn trapezoidal_displacement(samples: &[f64], dt: f64) -> RigResult<f64> {
    Ok(round_to(
        integrate_trapezoid(samples, dt)?,
        DISPLACEMENT_DECIMAL_PLACES,
    ))
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
