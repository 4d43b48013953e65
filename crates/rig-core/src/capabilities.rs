//! Device capability traits.
//!
//! The orchestrator is written against these traits rather than concrete
//! drivers, so the simulators and test doubles are interchangeable:
//!
//! - A velocity sensor implements [`VelocitySensor`]
//! - A stereo camera pair implements [`StereoCamera`]
//!
//! Each trait is thread-safe (`Send + Sync`) so a single device can be shared
//! between the measurement and capture loops behind an `Arc`.

use crate::data::{LightType, StereoCapture};
use crate::error::DeviceResult;
use async_trait::async_trait;

/// Source of surface velocity samples in cm/min.
pub trait VelocitySensor: Send + Sync {
    /// Read the latest velocity sample.
    ///
    /// Returns `None` when no sample is available; callers treat this as the
    /// end of the current batch.
    fn velocity(&self) -> Option<f64>;
}

/// Stereo camera pair with a consumable trigger.
///
/// The trigger is a single-slot arm: a second `trigger()` before `collect()`
/// is rejected, and `collect()` consumes the arm.
#[async_trait]
pub trait StereoCamera: Send + Sync {
    /// Prepare the cameras for use.
    async fn open(&self) -> DeviceResult<()>;

    /// Whether `open()` has been called.
    async fn is_open(&self) -> bool;

    /// Arm a capture.
    ///
    /// Returns `Ok(false)` when a previous capture has not been collected yet.
    async fn trigger(&self) -> DeviceResult<bool>;

    /// Collect the pictures taken by the outstanding trigger.
    async fn collect(&self, light: LightType) -> DeviceResult<StereoCapture>;
}
