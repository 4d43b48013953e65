//! Timing configuration for realistic mode.

use std::time::Duration;

/// Timing configuration for realistic mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Period between waveform generation steps in milliseconds
    pub waveform_step_ms: u64,
    /// Base shutter/read-out time of a stereo capture in milliseconds
    pub capture_base_ms: u64,
    /// Uniform jitter applied to the capture time, +/- milliseconds
    pub capture_jitter_ms: u64,
}

impl TimingConfig {
    /// Timing for the velocity waveform generator at the given update rate.
    pub fn waveform(update_rate_hz: f64) -> Self {
        let hz = if update_rate_hz > 0.0 { update_rate_hz } else { 50.0 };
        Self {
            waveform_step_ms: (1000.0 / hz).round() as u64,
            ..Self::default()
        }
    }

    /// Timing for the stereo camera pair (4 s +/- 1 s per capture)
    pub fn camera() -> Self {
        Self {
            capture_base_ms: 4000,
            capture_jitter_ms: 1000,
            ..Self::default()
        }
    }

    /// Waveform step period as a `Duration`
    pub fn waveform_step(&self) -> Duration {
        Duration::from_millis(self.waveform_step_ms)
    }

    /// Capture delay for a jitter factor in [-1, 1].
    pub fn capture_delay(&self, jitter_factor: f64) -> Duration {
        let jitter = jitter_factor.clamp(-1.0, 1.0) * self.capture_jitter_ms as f64;
        let millis = (self.capture_base_ms as f64 + jitter).max(0.0);
        Duration::from_secs_f64(millis / 1000.0)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            waveform_step_ms: 20,
            capture_base_ms: 0,
            capture_jitter_ms: 0,
        }
    }
}
