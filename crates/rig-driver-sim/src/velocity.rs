//! Simulated fabric velocity sensor.
//!
//! The waveform follows a repeating transport cycle:
//!
//! ```text
//!  100 |      ________
//!      |     /        \
//!      |    /          \
//!    0 |___/            \______
//!        ramp   hold    ramp  hold
//!        500    500     200   200   steps
//! ```
//!
//! Two independent random processes shape what callers see:
//!
//! - the background generation loop adds smooth [`NoiseSource`] noise to every
//!   step and publishes the `(current, noisy)` pair atomically;
//! - [`VelocitySimulator::read`] independently replaces a fraction of reads with
//!   outliers (sensor glitches), without touching the published state.
//!
//! # Example
//!
//! ```rust,ignore
//! let sensor = VelocitySimulator::builder().noise_coefficient(5.0).build();
//! sensor.start();
//! let velocity = sensor.read(); // cm/min
//! sensor.stop();
//! ```

use crate::common::{SimMode, SimRng, TimingConfig};
use crate::noise::NoiseSource;
use rig_core::VelocitySensor;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

// =============================================================================
// Configuration
// =============================================================================

/// Shape of one transport cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformProfile {
    /// Plateau reached by the ramp up (cm/min)
    pub high_plateau: f64,
    /// Plateau reached by the ramp down (cm/min)
    pub low_plateau: f64,
    pub ramp_up_steps: u32,
    pub high_hold_steps: u32,
    pub ramp_down_steps: u32,
    pub low_hold_steps: u32,
}

impl Default for WaveformProfile {
    fn default() -> Self {
        Self {
            high_plateau: 100.0,
            low_plateau: 0.0,
            ramp_up_steps: 500,
            high_hold_steps: 500,
            ramp_down_steps: 200,
            low_hold_steps: 200,
        }
    }
}

impl WaveformProfile {
    fn segments(&self) -> [Segment; 4] {
        [
            Segment::Ramp {
                steps: self.ramp_up_steps,
                target: self.high_plateau,
            },
            Segment::Hold {
                steps: self.high_hold_steps,
            },
            Segment::Ramp {
                steps: self.ramp_down_steps,
                target: self.low_plateau,
            },
            Segment::Hold {
                steps: self.low_hold_steps,
            },
        ]
    }
}

/// Configuration for [`VelocitySimulator`]
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityConfig {
    /// Scale applied to the [-1, 1] noise signal
    pub noise_coefficient: f64,
    /// Probability that a read returns an outlier
    pub outlier_probability: f64,
    /// Probability that an outlier is exactly zero
    pub outlier_zero_probability: f64,
    /// Range of non-zero outliers (inclusive)
    pub outlier_range: (f64, f64),
    pub profile: WaveformProfile,
    pub timing: TimingConfig,
    pub mode: SimMode,
    /// Seed for noise and outliers, `None` uses OS entropy
    pub seed: Option<u64>,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            noise_coefficient: 5.0,
            outlier_probability: 0.10,
            outlier_zero_probability: 0.30,
            outlier_range: (-150.0, 400.0),
            profile: WaveformProfile::default(),
            timing: TimingConfig::waveform(50.0),
            mode: SimMode::Realistic,
            seed: None,
        }
    }
}

// =============================================================================
// WaveformGenerator - the stepping state machine
// =============================================================================

/// Latest waveform state as published to readers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WaveformSample {
    /// Noise-free value
    pub current: f64,
    /// `current` plus scaled noise
    pub noisy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Segment {
    Ramp { steps: u32, target: f64 },
    Hold { steps: u32 },
}

impl Segment {
    fn steps(&self) -> u32 {
        match self {
            Segment::Ramp { steps, .. } | Segment::Hold { steps } => *steps,
        }
    }
}

/// Produces one waveform sample per step.
///
/// Owned by the generation loop; readers only see the published samples.
#[derive(Debug, Clone)]
pub struct WaveformGenerator {
    noise: NoiseSource,
    noise_coefficient: f64,
    segments: [Segment; 4],
    segment: usize,
    step_in_segment: u32,
    slope: f64,
    current: f64,
}

impl WaveformGenerator {
    pub fn new(profile: WaveformProfile, noise: NoiseSource, noise_coefficient: f64) -> Self {
        let mut generator = Self {
            noise,
            noise_coefficient,
            segments: profile.segments(),
            segment: 0,
            step_in_segment: 0,
            slope: 0.0,
            current: 0.0,
        };
        generator.enter_segment(0);
        generator
    }

    /// Advance one step and return the new sample.
    pub fn step(&mut self) -> WaveformSample {
        // Zero-length segments are skipped; a fully empty profile just holds
        for _ in 0..self.segments.len() {
            if self.step_in_segment < self.segments[self.segment].steps() {
                break;
            }
            self.enter_segment((self.segment + 1) % self.segments.len());
        }

        if let Segment::Ramp { .. } = self.segments[self.segment] {
            self.current += self.slope;
        }
        self.step_in_segment = self.step_in_segment.saturating_add(1);

        WaveformSample {
            current: self.current,
            noisy: self.current + self.noise.next() * self.noise_coefficient,
        }
    }

    /// Index of the active segment (0 ramp up, 1 high hold, 2 ramp down, 3 low hold).
    pub fn segment_index(&self) -> usize {
        self.segment
    }

    fn enter_segment(&mut self, index: usize) {
        self.segment = index;
        self.step_in_segment = 0;
        self.slope = match self.segments[index] {
            Segment::Ramp { steps, target } if steps > 0 => {
                (target - self.current) / f64::from(steps)
            }
            _ => 0.0,
        };
        tracing::trace!(segment = index, current = self.current, "Waveform segment");
    }
}

// =============================================================================
// VelocitySimulator
// =============================================================================

/// Builder for [`VelocitySimulator`]
pub struct VelocitySimulatorBuilder {
    config: VelocityConfig,
    span: Option<tracing::Span>,
}

impl VelocitySimulatorBuilder {
    pub fn new() -> Self {
        Self {
            config: VelocityConfig::default(),
            span: None,
        }
    }

    pub fn config(mut self, config: VelocityConfig) -> Self {
        self.config = config;
        self
    }

    pub fn noise_coefficient(mut self, coefficient: f64) -> Self {
        self.config.noise_coefficient = coefficient;
        self
    }

    pub fn outlier_probability(mut self, probability: f64) -> Self {
        self.config.outlier_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn outlier_zero_probability(mut self, probability: f64) -> Self {
        self.config.outlier_zero_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn profile(mut self, profile: WaveformProfile) -> Self {
        self.config.profile = profile;
        self
    }

    pub fn mode(mut self, mode: SimMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn update_rate_hz(mut self, hz: f64) -> Self {
        self.config.timing = TimingConfig::waveform(hz);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Span that scopes everything the simulator reports.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> VelocitySimulator {
        let span = self
            .span
            .unwrap_or_else(|| tracing::info_span!("velocity_sim"));
        VelocitySimulator::from_parts(self.config, span)
    }
}

impl Default for VelocitySimulatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulated velocity sensor with a background generation loop.
///
/// `read()` before `start()` returns the initial value (0); after `stop()` it
/// keeps returning the last published value (plus outliers).
pub struct VelocitySimulator {
    config: VelocityConfig,
    generator: Arc<Mutex<WaveformGenerator>>,
    state: Arc<watch::Sender<WaveformSample>>,
    read_rng: SimRng,
    running: Arc<AtomicBool>,
    /// Bumped on every start/stop; a loop exits once its epoch is stale
    epoch: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
    span: tracing::Span,
}

impl VelocitySimulator {
    /// Simulator with default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> VelocitySimulatorBuilder {
        VelocitySimulatorBuilder::new()
    }

    fn from_parts(config: VelocityConfig, span: tracing::Span) -> Self {
        let master = SimRng::new(config.seed);
        let noise = NoiseSource::new(&master.fork());
        let read_rng = master.fork();
        let generator = WaveformGenerator::new(config.profile, noise, config.noise_coefficient);
        let (state, _) = watch::channel(WaveformSample::default());

        Self {
            config,
            generator: Arc::new(Mutex::new(generator)),
            state: Arc::new(state),
            read_rng,
            running: Arc::new(AtomicBool::new(false)),
            epoch: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
            span,
        }
    }

    pub fn config(&self) -> &VelocityConfig {
        &self.config
    }

    /// Start the generation loop. No-op if it is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut task = lock(&self.task);
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let generation = GenerationLoop {
            generator: Arc::clone(&self.generator),
            state: Arc::clone(&self.state),
            epoch: Arc::clone(&self.epoch),
            own_epoch: epoch,
            mode: self.config.mode,
            timing: self.config.timing,
        };
        let _entered = self.span.enter();
        tracing::info!(
            noise_coefficient = self.config.noise_coefficient,
            step_ms = self.config.timing.waveform_step_ms,
            "Velocity sensor started"
        );
        *task = Some(tokio::spawn(generation.run().instrument(self.span.clone())));
    }

    /// Ask the generation loop to exit after its current step. Does not block.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            self.span.in_scope(|| tracing::info!("Velocity sensor stopping"));
        }
    }

    /// Wait for a stopped generation loop to finish its last step.
    pub async fn join(&self) {
        let handle = lock(&self.task).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                self.span
                    .in_scope(|| tracing::error!(error = %e, "Velocity generation loop failed"));
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Read the sensor in cm/min.
    ///
    /// With `outlier_probability` the read is replaced by an outlier: exactly 0
    /// with `outlier_zero_probability`, otherwise uniform over `outlier_range`.
    pub fn read(&self) -> f64 {
        if self.read_rng.chance(self.config.outlier_probability) {
            return self.outlier();
        }
        self.state.borrow().noisy
    }

    /// Latest published `(current, noisy)` pair, without outlier injection.
    pub fn sample(&self) -> WaveformSample {
        *self.state.borrow()
    }

    /// Subscribe to published waveform samples.
    pub fn subscribe(&self) -> watch::Receiver<WaveformSample> {
        self.state.subscribe()
    }

    fn outlier(&self) -> f64 {
        if self.read_rng.chance(self.config.outlier_zero_probability) {
            return 0.0;
        }
        let (low, high) = self.config.outlier_range;
        if low >= high {
            return low;
        }
        self.read_rng.gen_range(low..=high)
    }
}

impl Default for VelocitySimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VelocitySimulator {
    fn drop(&mut self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

impl VelocitySensor for VelocitySimulator {
    fn velocity(&self) -> Option<f64> {
        Some(self.read())
    }
}

struct GenerationLoop {
    generator: Arc<Mutex<WaveformGenerator>>,
    state: Arc<watch::Sender<WaveformSample>>,
    epoch: Arc<AtomicU64>,
    own_epoch: u64,
    mode: SimMode,
    timing: TimingConfig,
}

impl GenerationLoop {
    async fn run(self) {
        let mut steps: u64 = 0;
        while self.epoch.load(Ordering::SeqCst) == self.own_epoch {
            let sample = lock(&self.generator).step();
            self.state.send_replace(sample);
            steps += 1;

            if self.mode.sleeps() {
                tokio::time::sleep(self.timing.waveform_step()).await;
            } else {
                tokio::task::yield_now().await;
            }
        }
        tracing::debug!(steps, "Velocity generation loop exited");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quiet_generator(profile: WaveformProfile) -> WaveformGenerator {
        WaveformGenerator::new(profile, NoiseSource::seeded(1), 0.0)
    }

    #[test]
    fn test_generator_follows_transport_cycle() {
        let mut generator = quiet_generator(WaveformProfile::default());

        let mut last = WaveformSample::default();
        for _ in 0..500 {
            last = generator.step();
        }
        assert!((last.current - 100.0).abs() < 1e-6, "ramp up ends at 100");

        for _ in 0..500 {
            last = generator.step();
            assert!((last.current - 100.0).abs() < 1e-6, "high plateau holds");
        }

        for _ in 0..200 {
            last = generator.step();
        }
        assert!(last.current.abs() < 1e-6, "ramp down ends at 0");

        for _ in 0..200 {
            last = generator.step();
            assert!(last.current.abs() < 1e-6, "low plateau holds");
        }

        // Next cycle ramps up again
        let next = generator.step();
        assert!(next.current > 0.0);
        assert_eq!(generator.segment_index(), 0);
    }

    #[test]
    fn test_noisy_value_is_current_plus_scaled_noise() {
        let coefficient = 5.0;
        let mut generator =
            WaveformGenerator::new(WaveformProfile::default(), NoiseSource::seeded(7), coefficient);
        let mut reference = NoiseSource::seeded(7);
        for _ in 0..1500 {
            let sample = generator.step();
            let expected = sample.current + reference.next() * coefficient;
            assert!((sample.noisy - expected).abs() < 1e-12);
            assert!((sample.noisy - sample.current).abs() <= coefficient);
        }
    }

    #[test]
    fn test_empty_profile_holds_at_zero() {
        let profile = WaveformProfile {
            ramp_up_steps: 0,
            high_hold_steps: 0,
            ramp_down_steps: 0,
            low_hold_steps: 0,
            ..Default::default()
        };
        let mut generator = quiet_generator(profile);
        for _ in 0..10 {
            assert_eq!(generator.step().current, 0.0);
        }
    }

    #[test]
    fn test_read_before_start_returns_initial_value() {
        let sensor = VelocitySimulator::builder()
            .outlier_probability(0.0)
            .seed(1)
            .build();
        assert_eq!(sensor.read(), 0.0);
        assert_eq!(sensor.velocity(), Some(0.0));
        assert!(!sensor.is_running());
    }

    #[test]
    fn test_outlier_statistics() {
        let sensor = VelocitySimulator::builder()
            .outlier_probability(1.0)
            .outlier_zero_probability(0.3)
            .seed(42)
            .build();

        let reads = 10_000;
        let mut zeros = 0;
        for _ in 0..reads {
            let value = sensor.read();
            assert!((-150.0..=400.0).contains(&value));
            if value == 0.0 {
                zeros += 1;
            }
        }
        // ~30% exact zeros
        assert!(zeros > 2700 && zeros < 3300, "got {} zeros", zeros);
    }

    #[test]
    fn test_outliers_do_not_touch_published_state() {
        let sensor = VelocitySimulator::builder()
            .outlier_probability(1.0)
            .seed(3)
            .build();
        for _ in 0..100 {
            sensor.read();
        }
        assert_eq!(sensor.sample(), WaveformSample::default());
    }

    #[tokio::test]
    async fn test_start_publishes_samples() {
        let sensor = VelocitySimulator::builder()
            .mode(SimMode::Instant)
            .outlier_probability(0.0)
            .seed(11)
            .build();
        let mut updates = sensor.subscribe();

        sensor.start();
        assert!(sensor.is_running());
        updates.changed().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while sensor.sample().current <= 0.0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        sensor.stop();
        sensor.join().await;
        assert!(!sensor.is_running());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let sensor = VelocitySimulator::builder()
            .mode(SimMode::Instant)
            .seed(5)
            .build();
        sensor.start();
        sensor.start();
        sensor.start();
        assert!(sensor.is_running());
        sensor.stop();
        sensor.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_freezes_last_value() {
        let sensor = VelocitySimulator::builder()
            .outlier_probability(0.0)
            .seed(21)
            .build();
        sensor.start();
        tokio::time::sleep(Duration::from_millis(500)).await;

        sensor.stop();
        sensor.join().await;
        let frozen = sensor.sample();
        assert!(frozen.current > 0.0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sensor.sample(), frozen);
        assert_eq!(sensor.read(), frozen.noisy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_realistic_mode_steps_at_update_rate() {
        let sensor = VelocitySimulator::builder()
            .noise_coefficient(0.0)
            .outlier_probability(0.0)
            .update_rate_hz(50.0)
            .seed(2)
            .build();
        sensor.start();
        // 1 s at 50 Hz is ~50 steps of 100/500 on the ramp
        tokio::time::sleep(Duration::from_millis(990)).await;
        let current = sensor.sample().current;
        sensor.stop();
        sensor.join().await;
        assert!((current - 10.0).abs() < 0.5, "current = {}", current);
    }
}
