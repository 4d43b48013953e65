//! Core types and traits for the inline inspection rig.
//!
//! This crate is shared by the simulated drivers (`rig-driver-sim`) and the
//! application crate that orchestrates measurement and capture.
//!
//! - [`capabilities`] - the device seams: [`VelocitySensor`] and [`StereoCamera`]
//! - [`data`] - captured pictures, lights, batches and surface movement records
//! - [`error`] - the [`DeviceError`] taxonomy raised by devices

pub mod capabilities;
pub mod data;
pub mod error;

pub use capabilities::{StereoCamera, VelocitySensor};
pub use data::{
    CameraPosition, CapturedLight, LightBatch, LightType, Picture, StereoCapture, SurfaceMovement,
};
pub use error::{DeviceError, DeviceResult};
