//! In-memory collector for testing
//!
//! Records every delivery and offers:
//! - Controllable availability (`ping`)
//! - Failure injection on posts
//! - Simulated transport latency

use super::{CollectorError, RemoteCollector};
use async_trait::async_trait;
use rig_core::{LightBatch, SurfaceMovement};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Collector that keeps deliveries in memory.
///
/// # Example
///
/// ```
/// use inline_inspection::collector::{MemoryCollector, RemoteCollector};
///
/// # #[tokio::main]
/// # async fn main() {
/// let collector = MemoryCollector::new();
/// collector.post_surface_movement(0.4, 0.6).await.unwrap();
/// assert_eq!(collector.movements().len(), 1);
/// # }
/// ```
pub struct MemoryCollector {
    available: AtomicBool,
    failing: AtomicBool,
    latency: Duration,
    pings: AtomicUsize,
    movements: Mutex<Vec<SurfaceMovement>>,
    batches: Mutex<Vec<LightBatch>>,
}

impl MemoryCollector {
    /// Available collector with no latency.
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            latency: Duration::ZERO,
            pings: AtomicUsize::new(0),
            movements: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Delay every post by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every post fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn movements(&self) -> Vec<SurfaceMovement> {
        lock(&self.movements).clone()
    }

    pub fn batches(&self) -> Vec<LightBatch> {
        lock(&self.batches).clone()
    }

    async fn transport(&self) -> Result<(), CollectorError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollectorError::UnexpectedStatus {
                status: 500,
                expected: 201,
            });
        }
        Ok(())
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl RemoteCollector for MemoryCollector {
    async fn ping(&self) -> bool {
        self.pings.fetch_add(1, Ordering::SeqCst);
        self.available.load(Ordering::SeqCst)
    }

    async fn post_surface_movement(
        &self,
        velocity: f64,
        displacement: f64,
    ) -> Result<(), CollectorError> {
        self.transport().await?;
        lock(&self.movements).push(SurfaceMovement {
            velocity,
            displacement,
        });
        Ok(())
    }

    async fn post_picture_batch(&self, batch: LightBatch) -> Result<(), CollectorError> {
        self.transport().await?;
        lock(&self.batches).push(batch);
        Ok(())
    }
}
