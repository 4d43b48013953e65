//! Measurement and capture orchestration.
//!
//! - [`measurement`] - one velocity/displacement measurement over an interval
//! - [`frequency`] - the adaptive capture cadence search
//! - [`capture`] - the [`CaptureOrchestrator`] running both loops
//!
//! Loops stop cooperatively: every suspension point races a `watch` channel
//! that turns `true` on shutdown.

pub mod capture;
pub mod frequency;
pub mod measurement;

pub use capture::{CaptureOrchestrator, OrchestratorSettings};
pub use frequency::{find_optimal_frequency, FrequencySearch};
pub use measurement::{measure_surface, MeasurementSettings};

use crate::collector::RemoteCollector;
use std::time::Duration;
use tokio::sync::watch;

/// `secs` as a `Duration`, clamped to `[0, Duration::MAX]`.
///
/// NaN reads as zero.
pub(crate) fn saturating_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Resolves once shutdown is requested.
///
/// A dropped sender counts as a shutdown request.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Poll the collector until it answers.
///
/// Returns `false` when shutdown was requested first.
pub async fn wait_for_collector(
    collector: &dyn RemoteCollector,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> bool {
    let mut attempts = 0u32;
    loop {
        let available = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => return false,
            available = collector.ping() => available,
        };
        if available {
            tracing::info!(attempts = attempts + 1, "Collector available");
            return true;
        }

        attempts += 1;
        tracing::info!(
            attempts,
            retry_in_s = poll_interval.as_secs_f64(),
            "Waiting for the collector"
        );
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => return false,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MemoryCollector;
    use std::sync::Arc;

    #[test]
    fn out_of_range_seconds_saturate() {
        assert_eq!(saturating_secs(1.5), Duration::from_millis(1500));
        assert_eq!(saturating_secs(-3.0), Duration::ZERO);
        assert_eq!(saturating_secs(f64::NAN), Duration::ZERO);
        assert_eq!(saturating_secs(f64::INFINITY), Duration::MAX);
        assert_eq!(saturating_secs(1e30), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_until_collector_answers() {
        let collector = Arc::new(MemoryCollector::new());
        collector.set_available(false);
        let (_stop, shutdown) = watch::channel(false);

        let waiter = tokio::spawn({
            let collector = collector.clone();
            async move {
                wait_for_collector(collector.as_ref(), Duration::from_secs(1), shutdown).await
            }
        });
        tokio::time::sleep(Duration::from_millis(3500)).await;
        collector.set_available(true);

        assert!(waiter.await.unwrap());
        assert_eq!(collector.ping_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_the_wait() {
        let collector = MemoryCollector::new();
        collector.set_available(false);
        let (stop, shutdown) = watch::channel(false);

        let wait = wait_for_collector(&collector, Duration::from_secs(60), shutdown);
        let trigger = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            stop.send(true).unwrap();
        };
        let (available, ()) = tokio::join!(wait, trigger);
        assert!(!available);
    }

    #[tokio::test]
    async fn dropped_sender_counts_as_shutdown() {
        let (stop, mut shutdown) = watch::channel(false);
        drop(stop);
        shutdown_requested(&mut shutdown).await;
    }
}
