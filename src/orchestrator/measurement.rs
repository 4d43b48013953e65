//! Velocity-and-displacement measurement over one interval.

use super::saturating_secs;
use crate::config::MeasurementConfig;
use crate::error::{RigError, RigResult};
use crate::signal::{integrate_trapezoid, moving_average, round_to};
use rig_core::{SurfaceMovement, VelocitySensor};
use std::time::Duration;

/// Parameters of one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementSettings {
    pub samples_per_second: f64,
    pub moving_average_window: usize,
    pub decimal_places: u32,
    /// Sampling interval in seconds
    pub interval_s: f64,
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self::from(&MeasurementConfig::default())
    }
}

impl From<&MeasurementConfig> for MeasurementSettings {
    fn from(config: &MeasurementConfig) -> Self {
        Self {
            samples_per_second: config.samples_per_second,
            moving_average_window: config.moving_average_window,
            decimal_places: config.decimal_places,
            interval_s: config.interval_s,
        }
    }
}

impl MeasurementSettings {
    /// Same settings over a different interval.
    pub fn with_interval(self, interval_s: f64) -> Self {
        Self { interval_s, ..self }
    }

    /// Samples taken per measurement.
    ///
    /// Never fewer than one more than the smoothing window (and never fewer
    /// than two), so the smoothed series can always be integrated.
    pub fn sample_count(&self) -> usize {
        let floor = self.moving_average_window.saturating_add(1).max(2);
        let wanted = (self.samples_per_second * self.interval_s).ceil();
        if wanted.is_finite() && wanted > floor as f64 {
            wanted as usize
        } else {
            floor
        }
    }

    /// Pause between two consecutive reads.
    pub fn sample_period(&self) -> Duration {
        if self.samples_per_second > 0.0 && self.samples_per_second.is_finite() {
            saturating_secs(1.0 / self.samples_per_second)
        } else {
            Duration::ZERO
        }
    }
}

/// Sample the sensor over one interval and reduce the series to a movement.
///
/// The reported velocity is the last smoothed sample; the displacement is the
/// trapezoidal integral of the smoothed series with `dt = interval_s`. A sensor
/// returning `None` ends the series early.
pub async fn measure_surface(
    sensor: &dyn VelocitySensor,
    settings: &MeasurementSettings,
) -> RigResult<SurfaceMovement> {
    let wanted = settings.sample_count();
    let period = settings.sample_period();

    let mut samples = Vec::with_capacity(wanted);
    for i in 0..wanted {
        if i > 0 && !period.is_zero() {
            tokio::time::sleep(period).await;
        }
        match sensor.velocity() {
            Some(value) => samples.push(value),
            None => {
                tracing::debug!(collected = samples.len(), wanted, "Velocity series cut short");
                break;
            }
        }
    }

    let smoothed = moving_average(&samples, settings.moving_average_window);
    let Some(&last) = smoothed.last() else {
        return Err(RigError::InsufficientData { samples: 0 });
    };
    let displacement = integrate_trapezoid(&smoothed, settings.interval_s)?;

    Ok(SurfaceMovement {
        velocity: round_to(last, settings.decimal_places),
        displacement: round_to(displacement, settings.decimal_places),
    })
}
