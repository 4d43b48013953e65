//! The two rig loops.
//!
//! - The measurement loop reports the surface velocity and displacement of
//!   every interval to the collector.
//! - The capture loop picks a capture cadence once, then takes a green and a
//!   blue stereo pair every cycle and hands the batch to the dispatch pool.
//!
//! The loops only share the sensor and the cameras. A cycle-level failure is
//! logged and retried on the next cycle; a setup failure ends only its own
//! loop.

use super::frequency::{find_optimal_frequency, FrequencySearch};
use super::measurement::{measure_surface, MeasurementSettings};
use super::{saturating_secs, shutdown_requested};
use crate::collector::RemoteCollector;
use crate::config::RigConfig;
use crate::dispatch::{DispatchPool, DispatchSummary};
use crate::error::{RigError, RigResult};
use chrono::Utc;
use rig_core::{CapturedLight, LightBatch, LightType, StereoCamera, VelocitySensor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::Instrument;

/// Tunables of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorSettings {
    pub measurement: MeasurementSettings,
    pub search: FrequencySearch,
    pub max_in_flight_dispatches: usize,
    pub max_queued_dispatches: usize,
    pub drain_timeout: Duration,
}

impl OrchestratorSettings {
    fn from_parts(config: &RigConfig, drain_timeout: Duration) -> Self {
        Self {
            measurement: MeasurementSettings::from(&config.measurement),
            search: config.capture.frequency_search(),
            max_in_flight_dispatches: config.capture.max_in_flight_dispatches,
            max_queued_dispatches: config.capture.max_queued_dispatches,
            drain_timeout,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        let config = RigConfig::default();
        let drain_timeout = config
            .capture
            .shutdown_drain_timeout()
            .unwrap_or(Duration::ZERO);
        Self::from_parts(&config, drain_timeout)
    }
}

impl TryFrom<&RigConfig> for OrchestratorSettings {
    type Error = RigError;

    fn try_from(config: &RigConfig) -> RigResult<Self> {
        Ok(Self::from_parts(
            config,
            config.capture.shutdown_drain_timeout()?,
        ))
    }
}

/// Drives measurement and capture against a sensor, a camera pair and a
/// collector.
///
/// Cloning is cheap and clones share the same devices and dispatch pool.
#[derive(Clone)]
pub struct CaptureOrchestrator {
    sensor: Arc<dyn VelocitySensor>,
    camera: Arc<dyn StereoCamera>,
    collector: Arc<dyn RemoteCollector>,
    dispatch: Arc<DispatchPool>,
    settings: OrchestratorSettings,
    span: tracing::Span,
}

impl CaptureOrchestrator {
    pub fn new(
        sensor: Arc<dyn VelocitySensor>,
        camera: Arc<dyn StereoCamera>,
        collector: Arc<dyn RemoteCollector>,
        settings: OrchestratorSettings,
    ) -> Self {
        let span = tracing::info_span!("orchestrator");
        let dispatch = DispatchPool::new(
            Arc::clone(&collector),
            settings.max_in_flight_dispatches,
            settings.max_queued_dispatches,
        )
        .with_span(tracing::info_span!(parent: &span, "dispatch"));

        Self {
            sensor,
            camera,
            collector,
            dispatch: Arc::new(dispatch),
            settings,
            span,
        }
    }

    /// Report under `span` instead of the default `orchestrator` span.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn dispatch(&self) -> &DispatchPool {
        &self.dispatch
    }

    /// Run both loops until `shutdown` turns true, then drain the dispatch pool.
    ///
    /// A loop ending with an error is logged; the other loop keeps running.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> DispatchSummary {
        let measurement = {
            let this = self.clone();
            let shutdown = shutdown.clone();
            let span = tracing::info_span!(parent: &self.span, "measurement_loop");
            tokio::spawn(async move { this.measurement_loop(shutdown).await }.instrument(span))
        };
        let capture = {
            let this = self.clone();
            let span = tracing::info_span!(parent: &self.span, "capture_loop");
            tokio::spawn(async move { this.capture_loop(shutdown).await }.instrument(span))
        };

        let (measurement, capture) = tokio::join!(measurement, capture);
        self.span.in_scope(|| {
            for (name, result) in [("measurement", measurement), ("capture", capture)] {
                match result {
                    Ok(Ok(())) => tracing::info!(loop_name = name, "Loop stopped"),
                    Ok(Err(e)) => tracing::error!(loop_name = name, error = %e, "Loop terminated"),
                    Err(e) => tracing::error!(loop_name = name, error = %e, "Loop task failed"),
                }
            }
        });

        self.dispatch
            .shutdown(self.settings.drain_timeout)
            .instrument(self.span.clone())
            .await
    }

    /// Measure and report surface movement until shutdown.
    ///
    /// Failed measurements and failed reports are logged and retried on the
    /// next interval.
    pub async fn measurement_loop(&self, mut shutdown: watch::Receiver<bool>) -> RigResult<()> {
        let settings = self.settings.measurement;
        tracing::info!(
            samples = settings.sample_count(),
            interval_s = settings.interval_s,
            "Measuring surface velocity"
        );

        loop {
            let measured = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                measured = measure_surface(self.sensor.as_ref(), &settings) => measured,
            };

            match measured {
                Ok(movement) => {
                    tracing::info!(
                        velocity = movement.velocity,
                        displacement = movement.displacement,
                        "Surface movement measured"
                    );
                    if let Err(e) = self
                        .collector
                        .post_surface_movement(movement.velocity, movement.displacement)
                        .await
                    {
                        tracing::warn!(error = %e, "Surface movement not delivered");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Measurement failed, retrying next interval");
                    let pause = saturating_secs(settings.interval_s);
                    tokio::select! {
                        _ = shutdown_requested(&mut shutdown) => break,
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Probe the sensor for the capture cadence.
    pub async fn find_capture_interval(&self) -> RigResult<f64> {
        let measurement = self.settings.measurement;
        let sensor = self.sensor.as_ref();
        find_optimal_frequency(
            |interval| async move {
                measure_surface(sensor, &measurement.with_interval(interval))
                    .await
                    .map(|movement| movement.displacement)
            },
            &self.settings.search,
        )
        .await
    }

    /// Capture picture batches until shutdown.
    ///
    /// Returns an error only for setup failures (frequency search, opening the
    /// cameras) and for non-transient device errors such as a missing asset.
    pub async fn capture_loop(&self, mut shutdown: watch::Receiver<bool>) -> RigResult<()> {
        tracing::info!("Finding the capture interval");
        let interval_s = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => return Ok(()),
            found = self.find_capture_interval() => found?,
        };
        tracing::info!(interval_s, "Capture interval selected");
        let cadence = saturating_secs(interval_s);

        self.camera.open().await?;

        let mut last_image = Instant::now();
        loop {
            let cycle = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                cycle = self.capture_cycle(&mut last_image) => cycle,
            };

            match cycle {
                Ok(batch) => {
                    tracing::info!(lights = batch.len(), "Dispatching picture batch");
                    self.dispatch.submit(batch);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        error = %e,
                        retry_in_s = interval_s,
                        "Capture cycle skipped"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Capture failed");
                    return Err(e);
                }
            }

            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(cadence) => {}
            }
        }
        Ok(())
    }

    /// One trigger/collect per light, in capture order.
    ///
    /// Each light is stamped with the velocity at collection time and the
    /// displacement since the previous image (`velocity * elapsed seconds`).
    pub async fn capture_cycle(&self, last_image: &mut Instant) -> RigResult<LightBatch> {
        let mut batch = LightBatch::with_capacity(LightType::CAPTURE_ORDER.len());
        for light in LightType::CAPTURE_ORDER {
            if !self.camera.trigger().await? {
                // A stale arm from an abandoned cycle; collecting below clears it
                tracing::warn!(%light, "Trigger rejected, collecting the outstanding capture");
            }
            let capture = self.camera.collect(light).await?;

            let now = Instant::now();
            let elapsed = now.duration_since(*last_image).as_secs_f64();
            *last_image = now;

            let velocity = self.sensor.velocity().unwrap_or_else(|| {
                tracing::debug!(%light, "No velocity sample, stamping 0");
                0.0
            });
            batch.push(CapturedLight::new(
                capture,
                Utc::now(),
                velocity,
                velocity * elapsed,
            ));
        }
        Ok(batch)
    }
}
