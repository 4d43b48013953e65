//! Remote collector interface.
//!
//! The collector is the server that stores surface movements and picture
//! batches. The orchestrator only sees the [`RemoteCollector`] trait:
//!
//! - [`HttpCollector`] talks to the real server over HTTP/JSON
//! - [`MemoryCollector`] records calls in memory, for tests and dry runs
//!
//! Transport failures are reported as [`CollectorError`]; callers log them and
//! keep going.

mod http;
mod memory;

pub use http::{HttpCollector, LightPayload, PictureBatchPayload, PicturePayload, StereoPayload};
pub use memory::MemoryCollector;

use async_trait::async_trait;
use rig_core::LightBatch;
use thiserror::Error;

/// Transport failures talking to the collector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollectorError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected status {status}, expected {expected}")]
    UnexpectedStatus { status: u16, expected: u16 },
}

/// Destination of measurements and picture batches.
#[async_trait]
pub trait RemoteCollector: Send + Sync {
    /// Liveness probe. Any failure reads as "not available".
    async fn ping(&self) -> bool;

    /// Report the surface velocity and displacement of one measurement interval.
    async fn post_surface_movement(
        &self,
        velocity: f64,
        displacement: f64,
    ) -> Result<(), CollectorError>;

    /// Deliver the pictures of one capture cycle.
    async fn post_picture_batch(&self, batch: LightBatch) -> Result<(), CollectorError>;
}
