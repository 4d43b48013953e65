//! Rig configuration using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. `config/inspection.toml` (optional)
//! 3. Environment variables prefixed with `INSPECTION_`, using `__` between
//!    section and key
//!
//! Keys are snake_case. The camelCase spellings used by older deployments
//! (`samplesPerSecond`, `cameraFieldOfView`, ...) are accepted as aliases.
//!
//! # Example
//! ```no_run
//! use inline_inspection::config::RigConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // INSPECTION_MEASUREMENT__SAMPLES_PER_SECOND=100 overrides the file
//! let config = RigConfig::load()?;
//! config.validate()?;
//! println!("Collector: {}", config.collector.base_url);
//! # Ok(())
//! # }
//! ```

use crate::error::{RigError, RigResult};
use crate::orchestrator::FrequencySearch;
use crate::tracing_setup::OutputFormat;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use rig_driver_sim::{TimingConfig, VelocityConfig, WaveformProfile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/inspection.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "INSPECTION_";

/// Top-level rig configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub application: ApplicationConfig,
    pub collector: CollectorConfig,
    pub measurement: MeasurementConfig,
    pub capture: CaptureConfig,
    pub velocity: VelocitySettings,
    pub camera: CameraSettings,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Log output format as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl From<LogFormat> for OutputFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Pretty => OutputFormat::Pretty,
            LogFormat::Compact => OutputFormat::Compact,
            LogFormat::Json => OutputFormat::Json,
        }
    }
}

/// Remote collector endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Base URL, e.g. `http://127.0.0.1:5000`
    pub base_url: String,
    /// Seconds between liveness probes while waiting for the collector
    pub ping_interval_s: f64,
    /// Per-request timeout in seconds
    pub request_timeout_s: f64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            ping_interval_s: 5.0,
            request_timeout_s: 10.0,
        }
    }
}

impl CollectorConfig {
    pub fn ping_interval(&self) -> RigResult<Duration> {
        seconds("collector.ping_interval_s", self.ping_interval_s)
    }

    pub fn request_timeout(&self) -> RigResult<Duration> {
        seconds("collector.request_timeout_s", self.request_timeout_s)
    }
}

/// Velocity measurement loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    #[serde(alias = "samplesPerSecond")]
    pub samples_per_second: f64,
    #[serde(alias = "movingAverageWindow")]
    pub moving_average_window: usize,
    /// Length of one measurement interval in seconds
    pub interval_s: f64,
    /// Rounding applied to reported velocity and displacement
    pub decimal_places: u32,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            samples_per_second: 66.0,
            moving_average_window: 3,
            interval_s: 1.0,
            decimal_places: 3,
        }
    }
}

/// Image capture loop and its dispatch pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Vertical field of view of the cameras, in displacement units
    #[serde(alias = "cameraFieldOfView")]
    pub camera_field_of_view: f64,
    /// Lowest capture interval the frequency search may return, seconds
    #[serde(alias = "minimumCaptureFrequency")]
    pub minimum_capture_frequency: f64,
    pub initial_frequency: f64,
    pub frequency_step: f64,
    pub max_in_flight_dispatches: usize,
    pub max_queued_dispatches: usize,
    pub shutdown_drain_timeout_s: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_field_of_view: 25.0,
            minimum_capture_frequency: 0.001,
            initial_frequency: 1.0,
            frequency_step: 0.05,
            max_in_flight_dispatches: 4,
            max_queued_dispatches: 32,
            shutdown_drain_timeout_s: 10.0,
        }
    }
}

impl CaptureConfig {
    pub fn frequency_search(&self) -> FrequencySearch {
        FrequencySearch {
            initial: self.initial_frequency,
            step: self.frequency_step,
            floor: self.minimum_capture_frequency,
            field_of_view: self.camera_field_of_view,
        }
    }

    pub fn shutdown_drain_timeout(&self) -> RigResult<Duration> {
        seconds(
            "capture.shutdown_drain_timeout_s",
            self.shutdown_drain_timeout_s,
        )
    }
}

/// Simulated velocity sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocitySettings {
    #[serde(alias = "noiseCoefficient")]
    pub noise_coefficient: f64,
    #[serde(alias = "outlierProbability")]
    pub outlier_probability: f64,
    pub outlier_zero_probability: f64,
    pub update_rate_hz: f64,
    pub seed: Option<u64>,
    /// Plateaus and segment lengths of the transport cycle
    pub profile: WaveformProfile,
}

impl Default for VelocitySettings {
    fn default() -> Self {
        Self {
            noise_coefficient: 5.0,
            outlier_probability: 0.10,
            outlier_zero_probability: 0.30,
            update_rate_hz: 50.0,
            seed: None,
            profile: WaveformProfile::default(),
        }
    }
}

impl VelocitySettings {
    /// Simulator configuration for these settings.
    pub fn simulator_config(&self) -> VelocityConfig {
        VelocityConfig {
            noise_coefficient: self.noise_coefficient,
            outlier_probability: self.outlier_probability,
            outlier_zero_probability: self.outlier_zero_probability,
            timing: TimingConfig::waveform(self.update_rate_hz),
            seed: self.seed,
            profile: self.profile,
            ..VelocityConfig::default()
        }
    }
}

/// Simulated stereo cameras
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub capture_base_delay_ms: u64,
    pub capture_jitter_ms: u64,
    /// Directory of `{position}_picture_{light}.jpg` files; generated
    /// patterns are used when unset
    pub asset_dir: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            capture_base_delay_ms: 4000,
            capture_jitter_ms: 1000,
            asset_dir: None,
            seed: None,
        }
    }
}

impl CameraSettings {
    pub fn timing(&self) -> TimingConfig {
        TimingConfig {
            capture_base_ms: self.capture_base_delay_ms,
            capture_jitter_ms: self.capture_jitter_ms,
            ..TimingConfig::camera()
        }
    }
}

/// Seconds from a config key as a `Duration`.
///
/// Negative, NaN, infinite and out-of-range values are configuration errors.
fn seconds(key: &str, secs: f64) -> RigResult<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        RigError::Configuration(format!(
            "{key} must be a non-negative, finite number of seconds, got {secs}"
        ))
    })
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl RigConfig {
    /// Load from `config/inspection.toml` and `INSPECTION_` environment variables.
    ///
    /// Example: `INSPECTION_APPLICATION__LOG_LEVEL=debug`
    pub fn load() -> RigResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path. A missing file leaves the defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> RigResult<Self> {
        Ok(Self::figment(path).extract()?)
    }

    /// Provider stack used by [`RigConfig::load_from`].
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> RigResult<()> {
        let invalid = |msg: String| Err(RigError::Configuration(msg));

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        let m = &self.measurement;
        if !positive(m.samples_per_second) {
            return invalid(format!(
                "samples_per_second must be positive, got {}",
                m.samples_per_second
            ));
        }
        if m.moving_average_window == 0 {
            return invalid("moving_average_window must be at least 1".to_string());
        }
        if !positive(m.interval_s) {
            return invalid(format!("interval_s must be positive, got {}", m.interval_s));
        }
        seconds("measurement.interval_s", m.interval_s)?;
        if !(m.samples_per_second * m.interval_s).is_finite() {
            return invalid(format!(
                "{} samples per second over {} s is not a usable sample count",
                m.samples_per_second, m.interval_s
            ));
        }

        for (name, p) in [
            ("outlier_probability", self.velocity.outlier_probability),
            (
                "outlier_zero_probability",
                self.velocity.outlier_zero_probability,
            ),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return invalid(format!("{} must be within [0, 1], got {}", name, p));
            }
        }
        let profile = &self.velocity.profile;
        if !(profile.high_plateau.is_finite() && profile.low_plateau.is_finite()) {
            return invalid(format!(
                "velocity.profile plateaus must be finite, got {} and {}",
                profile.high_plateau, profile.low_plateau
            ));
        }
        if !positive(self.velocity.update_rate_hz) {
            return invalid(format!(
                "update_rate_hz must be positive, got {}",
                self.velocity.update_rate_hz
            ));
        }

        let c = &self.capture;
        if !positive(c.camera_field_of_view) {
            return invalid(format!(
                "camera_field_of_view must be positive, got {}",
                c.camera_field_of_view
            ));
        }
        if !positive(c.frequency_step) {
            return invalid(format!(
                "frequency_step must be positive, got {}",
                c.frequency_step
            ));
        }
        if !positive(c.initial_frequency) {
            return invalid(format!(
                "initial_frequency must be positive, got {}",
                c.initial_frequency
            ));
        }
        seconds("capture.initial_frequency", c.initial_frequency)?;
        let floor_fits =
            positive(c.minimum_capture_frequency) && c.minimum_capture_frequency < c.initial_frequency;
        if !floor_fits {
            return invalid(format!(
                "minimum_capture_frequency must be in (0, {}), got {}",
                c.initial_frequency, c.minimum_capture_frequency
            ));
        }
        if c.max_in_flight_dispatches == 0 {
            return invalid("max_in_flight_dispatches must be at least 1".to_string());
        }
        if c.max_queued_dispatches == 0 {
            return invalid("max_queued_dispatches must be at least 1".to_string());
        }

        c.shutdown_drain_timeout()?;

        let collector = &self.collector;
        if collector.base_url.trim().is_empty() {
            return invalid("collector base_url must not be empty".to_string());
        }
        for (key, secs) in [
            ("ping_interval_s", collector.ping_interval_s),
            ("request_timeout_s", collector.request_timeout_s),
        ] {
            if !positive(secs) {
                return invalid(format!("collector.{key} must be positive, got {secs}"));
            }
        }
        collector.ping_interval()?;
        collector.request_timeout()?;

        Ok(())
    }
}
