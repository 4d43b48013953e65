//! Simulated stereo camera pair with a consumable trigger.
//!
//! State machine:
//!
//! ```text
//!   Idle --trigger()--> Armed --collect()--> Idle
//! ```
//!
//! The trigger state lives behind one async mutex. `collect()` keeps the lock
//! for the whole simulated shutter/read-out delay, so a concurrent `trigger()`
//! waits for the capture to finish instead of observing a half-done transition.
//! Leaving `collect()` in any way (success, error, cancelled future) disarms.

use crate::assets::{AssetCatalog, DEFAULT_PATTERN_HEIGHT, DEFAULT_PATTERN_WIDTH};
use crate::common::{SimMode, SimRng, TimingConfig};
use async_trait::async_trait;
use rig_core::{
    CameraPosition, DeviceError, DeviceResult, LightType, Picture, StereoCamera, StereoCapture,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tracing::Instrument;

/// ISO values the sensors can pick from
pub const ISO_VALUES: [u32; 6] = [50, 100, 200, 400, 800, 1600];
/// Diaphragm openings (f-numbers) the lenses can pick from
pub const DIAPHRAGM_OPENINGS: [f64; 5] = [2.8, 5.0, 5.6, 8.0, 11.0];
/// Shortest exposure time in seconds
pub const EXPOSURE_MIN_S: f64 = 0.00125;
/// Longest exposure time in seconds
pub const EXPOSURE_MAX_S: f64 = 2.0;

/// Trigger slot of the camera pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerState {
    #[default]
    Idle,
    Armed,
}

/// Returns the trigger to `Idle` when dropped.
struct DisarmOnDrop<'a> {
    state: MutexGuard<'a, TriggerState>,
}

impl Drop for DisarmOnDrop<'_> {
    fn drop(&mut self) {
        *self.state = TriggerState::Idle;
    }
}

// =============================================================================
// CameraSimulatorBuilder
// =============================================================================

/// Builder for [`CameraSimulator`]
pub struct CameraSimulatorBuilder {
    assets: Option<AssetCatalog>,
    mode: SimMode,
    timing: TimingConfig,
    seed: Option<u64>,
    span: Option<tracing::Span>,
}

impl CameraSimulatorBuilder {
    pub fn new() -> Self {
        Self {
            assets: None,
            mode: SimMode::Realistic,
            timing: TimingConfig::camera(),
            seed: None,
            span: None,
        }
    }

    /// Image assets, defaults to generated weave patterns.
    pub fn assets(mut self, assets: AssetCatalog) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn mode(mut self, mode: SimMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn timing_config(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Base capture delay and its +/- jitter, in milliseconds.
    pub fn capture_delay(mut self, base_ms: u64, jitter_ms: u64) -> Self {
        self.timing.capture_base_ms = base_ms;
        self.timing.capture_jitter_ms = jitter_ms;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> CameraSimulator {
        CameraSimulator {
            open: AtomicBool::new(false),
            trigger: Mutex::new(TriggerState::Idle),
            assets: self.assets.unwrap_or_else(|| {
                AssetCatalog::generated(DEFAULT_PATTERN_WIDTH, DEFAULT_PATTERN_HEIGHT)
            }),
            rng: SimRng::new(self.seed),
            mode: self.mode,
            timing: self.timing,
            captures: AtomicU64::new(0),
            span: self
                .span
                .unwrap_or_else(|| tracing::info_span!("camera_sim")),
        }
    }
}

impl Default for CameraSimulatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// CameraSimulator
// =============================================================================

/// Simulated stereo camera pair.
///
/// # Example
///
/// ```rust,ignore
/// let camera = CameraSimulator::builder().mode(SimMode::Instant).build();
/// camera.open().await?;
/// assert!(camera.trigger().await?);
/// let capture = camera.collect(LightType::Green).await?;
/// ```
pub struct CameraSimulator {
    open: AtomicBool,
    trigger: Mutex<TriggerState>,
    assets: AssetCatalog,
    rng: SimRng,
    mode: SimMode,
    timing: TimingConfig,
    captures: AtomicU64,
    span: tracing::Span,
}

impl CameraSimulator {
    /// Camera with generated assets and realistic capture timing.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> CameraSimulatorBuilder {
        CameraSimulatorBuilder::new()
    }

    /// Current trigger state.
    ///
    /// Waits for an in-progress `collect()` to finish.
    pub async fn state(&self) -> TriggerState {
        *self.trigger.lock().await
    }

    /// Number of completed captures.
    pub fn capture_count(&self) -> u64 {
        self.captures.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> DeviceResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DeviceError::NotReady)
        }
    }

    async fn picture(&self, light: LightType, position: CameraPosition) -> DeviceResult<Picture> {
        let image = self.assets.load(light, position).await?;
        let iso = self.rng.choose(&ISO_VALUES).unwrap_or(ISO_VALUES[0]);
        let diaphragm_opening = self
            .rng
            .choose(&DIAPHRAGM_OPENINGS)
            .unwrap_or(DIAPHRAGM_OPENINGS[0]);
        let exposure = self.rng.gen_range(EXPOSURE_MIN_S..=EXPOSURE_MAX_S);

        Ok(Picture {
            image,
            exposure_time_s: (exposure * 100.0).round() / 100.0,
            diaphragm_opening,
            iso,
        })
    }

    async fn capture(&self, light: LightType) -> DeviceResult<StereoCapture> {
        let left = self.picture(light, CameraPosition::Left).await?;
        let right = self.picture(light, CameraPosition::Right).await?;

        if self.mode.sleeps() {
            let delay = self.timing.capture_delay(self.rng.gen_range(-1.0..=1.0));
            tracing::trace!(delay_ms = delay.as_millis() as u64, "Shutter open");
            tokio::time::sleep(delay).await;
        }

        Ok(StereoCapture { light, left, right })
    }
}

impl Default for CameraSimulator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StereoCamera for CameraSimulator {
    async fn open(&self) -> DeviceResult<()> {
        self.open.store(true, Ordering::SeqCst);
        self.span.in_scope(|| tracing::info!("Cameras opened"));
        Ok(())
    }

    async fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn trigger(&self) -> DeviceResult<bool> {
        self.ensure_open()?;

        let mut state = self.trigger.lock().await;
        match *state {
            TriggerState::Armed => {
                self.span
                    .in_scope(|| tracing::debug!("Trigger rejected, previous capture not collected"));
                Ok(false)
            }
            TriggerState::Idle => {
                *state = TriggerState::Armed;
                self.span.in_scope(|| tracing::debug!("Cameras armed"));
                Ok(true)
            }
        }
    }

    async fn collect(&self, light: LightType) -> DeviceResult<StereoCapture> {
        self.ensure_open()?;

        async {
            let state = self.trigger.lock().await;
            if *state != TriggerState::Armed {
                return Err(DeviceError::NotYetTriggered);
            }
            let _disarm = DisarmOnDrop { state };

            let capture = self.capture(light).await?;
            let count = self.captures.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(%light, count, "Stereo capture collected");
            Ok(capture)
        }
        .instrument(self.span.clone())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn instant_camera() -> CameraSimulator {
        CameraSimulator::builder()
            .mode(SimMode::Instant)
            .assets(AssetCatalog::generated(16, 12))
            .seed(42)
            .build()
    }

    #[tokio::test]
    async fn test_trigger_before_open_is_not_ready() {
        let camera = instant_camera();
        assert!(!camera.is_open().await);
        assert_eq!(camera.trigger().await, Err(DeviceError::NotReady));
        assert_eq!(
            camera.collect(LightType::Green).await.unwrap_err(),
            DeviceError::NotReady
        );
    }

    #[tokio::test]
    async fn test_collect_without_trigger_is_not_yet_triggered() {
        let camera = instant_camera();
        camera.open().await.unwrap();
        assert_eq!(
            camera.collect(LightType::Green).await.unwrap_err(),
            DeviceError::NotYetTriggered
        );
        assert_eq!(camera.state().await, TriggerState::Idle);
    }

    #[tokio::test]
    async fn test_trigger_is_consumable() {
        let camera = instant_camera();
        camera.open().await.unwrap();

        assert!(camera.trigger().await.unwrap());
        assert!(!camera.trigger().await.unwrap());
        assert_eq!(camera.state().await, TriggerState::Armed);

        camera.collect(LightType::Green).await.unwrap();
        assert_eq!(camera.state().await, TriggerState::Idle);
        assert!(camera.trigger().await.unwrap());
    }

    #[tokio::test]
    async fn test_capture_metadata_within_sets() {
        let camera = instant_camera();
        camera.open().await.unwrap();

        for _ in 0..50 {
            assert!(camera.trigger().await.unwrap());
            let capture = camera.collect(LightType::Blue).await.unwrap();
            assert_eq!(capture.light, LightType::Blue);
            for picture in [&capture.left, &capture.right] {
                assert!(ISO_VALUES.contains(&picture.iso));
                assert!(DIAPHRAGM_OPENINGS.contains(&picture.diaphragm_opening));
                assert!((0.0..=2.0).contains(&picture.exposure_time_s));
                let cents = picture.exposure_time_s * 100.0;
                assert!((cents - cents.round()).abs() < 1e-9);
                assert_eq!(picture.image.len(), 16 * 12 * 3);
            }
        }
        assert_eq!(camera.capture_count(), 50);
    }

    #[tokio::test]
    async fn test_missing_asset_still_disarms() {
        let mut assets = AssetCatalog::generated(8, 8);
        assets.remove(LightType::Green, CameraPosition::Right);
        let camera = CameraSimulator::builder()
            .mode(SimMode::Instant)
            .assets(assets)
            .build();
        camera.open().await.unwrap();

        assert!(camera.trigger().await.unwrap());
        let err = camera.collect(LightType::Green).await.unwrap_err();
        assert!(matches!(err, DeviceError::AssetNotFound { .. }));
        assert_eq!(camera.state().await, TriggerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_blocks_for_capture_delay() {
        let camera = CameraSimulator::builder()
            .assets(AssetCatalog::generated(8, 8))
            .capture_delay(4000, 1000)
            .seed(3)
            .build();
        camera.open().await.unwrap();
        camera.trigger().await.unwrap();

        let start = tokio::time::Instant::now();
        camera.collect(LightType::Green).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
        assert!(elapsed <= Duration::from_secs(5), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_collect_disarms() {
        let camera = CameraSimulator::builder()
            .assets(AssetCatalog::generated(8, 8))
            .capture_delay(4000, 0)
            .build();
        camera.open().await.unwrap();
        camera.trigger().await.unwrap();

        let result =
            tokio::time::timeout(Duration::from_secs(1), camera.collect(LightType::Blue)).await;
        assert!(result.is_err(), "collect should still be sleeping");
        assert_eq!(camera.state().await, TriggerState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_trigger_collect_never_double_arms() {
        let camera = Arc::new(instant_camera());
        camera.open().await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for worker in 0..8 {
            let camera = Arc::clone(&camera);
            tasks.spawn(async move {
                let mut triggered = 0u64;
                let mut collected = 0u64;
                for i in 0..200 {
                    if (i + worker) % 2 == 0 {
                        if camera.trigger().await.unwrap() {
                            triggered += 1;
                        }
                    } else if camera.collect(LightType::Green).await.is_ok() {
                        collected += 1;
                    }
                }
                (triggered, collected)
            });
        }

        let (mut triggered, mut collected) = (0, 0);
        while let Some(result) = tasks.join_next().await {
            let (t, c) = result.unwrap();
            triggered += t;
            collected += c;
        }

        let still_armed = u64::from(camera.state().await == TriggerState::Armed);
        assert_eq!(triggered, collected + still_armed);
    }
}
