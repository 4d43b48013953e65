//! Bounded background delivery of picture batches.
//!
//! The capture loop hands every completed [`LightBatch`] to a [`DispatchPool`]
//! and moves on; delivery happens on separate Tokio tasks.
//!
//! Two limits keep a slow collector from piling up memory:
//! - at most `max_in_flight` transport calls run at once (semaphore permits),
//! - at most `max_queued` batches are outstanding, counting those waiting for a
//!   permit. Extra batches are dropped with a warning.
//!
//! On shutdown the pool stops accepting work, gives outstanding deliveries a
//! bounded time to finish and aborts whatever is left.

use crate::collector::RemoteCollector;
use rig_core::LightBatch;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Outcome counts of a pool's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Batches the collector accepted
    pub delivered: u64,
    /// Batches the collector rejected or could not be reached for
    pub failed: u64,
    /// Batches refused because the queue was full or the pool was closed
    pub dropped: u64,
    /// Batches still outstanding when the drain timeout expired
    pub abandoned: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Worker pool delivering picture batches to the collector.
pub struct DispatchPool {
    collector: Arc<dyn RemoteCollector>,
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    max_queued: usize,
    accepting: AtomicBool,
    counters: Arc<Counters>,
    span: tracing::Span,
}

impl DispatchPool {
    /// Pool with at most `max_in_flight` concurrent deliveries and
    /// `max_queued` outstanding batches. Both are raised to at least 1.
    pub fn new(collector: Arc<dyn RemoteCollector>, max_in_flight: usize, max_queued: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            collector,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            tasks: Mutex::new(JoinSet::new()),
            max_queued: max_queued.max(max_in_flight),
            accepting: AtomicBool::new(true),
            counters: Arc::new(Counters::default()),
            span: tracing::info_span!("dispatch"),
        }
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Queue a batch for delivery without waiting for it.
    ///
    /// Returns `false` when the batch was dropped. Must be called from within
    /// a Tokio runtime.
    pub fn submit(&self, batch: LightBatch) -> bool {
        let mut tasks = self.lock_tasks();
        reap(&mut tasks, &self.span);

        if !self.accepting.load(Ordering::SeqCst) {
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
            self.span
                .in_scope(|| tracing::warn!("Dispatch pool closed, picture batch dropped"));
            return false;
        }
        if tasks.len() >= self.max_queued {
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
            self.span.in_scope(|| {
                tracing::warn!(
                    outstanding = tasks.len(),
                    "Dispatch queue full, picture batch dropped"
                )
            });
            return false;
        }

        let collector = Arc::clone(&self.collector);
        let permits = Arc::clone(&self.permits);
        let counters = Arc::clone(&self.counters);
        let lights = batch.len();
        let delivery = async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            match collector.post_picture_batch(batch).await {
                Ok(()) => {
                    counters.delivered.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!(lights, "Picture batch delivered");
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!(error = %e, lights, "Picture batch delivery failed");
                }
            }
        };
        tasks.spawn(delivery.instrument(self.span.clone()));
        true
    }

    /// Batches queued or in flight.
    pub fn outstanding(&self) -> usize {
        let mut tasks = self.lock_tasks();
        reap(&mut tasks, &self.span);
        tasks.len()
    }

    /// Counts so far.
    pub fn summary(&self) -> DispatchSummary {
        DispatchSummary {
            delivered: self.counters.delivered.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            dropped: self.counters.dropped.load(Ordering::SeqCst),
            abandoned: 0,
        }
    }

    /// Stop accepting batches and wait up to `drain_timeout` for outstanding
    /// deliveries. Deliveries still running afterwards are aborted and counted
    /// as abandoned.
    pub async fn shutdown(&self, drain_timeout: Duration) -> DispatchSummary {
        self.accepting.store(false, Ordering::SeqCst);
        let mut tasks = std::mem::take(&mut *self.lock_tasks());

        let span = self.span.clone();
        let drained = tokio::time::timeout(drain_timeout, async {
            while let Some(result) = tasks.join_next().await {
                log_join_error(result, &span);
            }
        })
        .await;

        let abandoned = if drained.is_err() {
            let remaining = tasks.len() as u64;
            tasks.shutdown().await;
            remaining
        } else {
            0
        };

        let summary = DispatchSummary {
            abandoned,
            ..self.summary()
        };
        self.span.in_scope(|| {
            tracing::info!(
                delivered = summary.delivered,
                failed = summary.failed,
                dropped = summary.dropped,
                abandoned = summary.abandoned,
                "Dispatch pool drained"
            )
        });
        summary
    }

    fn lock_tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn reap(tasks: &mut JoinSet<()>, span: &tracing::Span) {
    while let Some(result) = tasks.try_join_next() {
        log_join_error(result, span);
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>, span: &tracing::Span) {
    if let Err(e) = result {
        if !e.is_cancelled() {
            span.in_scope(|| tracing::error!(error = %e, "Dispatch task failed"));
        }
    }
}
