//! Simulated drivers for the inline inspection rig
//!
//! This crate provides software stand-ins for the rig hardware, so the capture
//! orchestrator can run without a conveyor or cameras attached. All simulated
//! devices use async-safe operations (`tokio::time::sleep`, never
//! `std::thread::sleep`).
//!
//! # Available Simulators
//!
//! - [`VelocitySimulator`] - Fabric velocity sensor following a ramp/hold transport cycle
//! - [`CameraSimulator`] - Stereo camera pair with a consumable trigger
//!
//! # Timing Characteristics (Realistic mode)
//!
//! - VelocitySimulator: 50 Hz waveform updates, smooth noise, 10% read outliers
//! - CameraSimulator: 4 s +/- 1 s shutter and read-out per capture
//!
//! `SimMode::Instant` removes every delay, for unit tests.

pub mod assets;
mod camera;
pub mod common;
pub mod noise;
mod velocity;

pub use assets::AssetCatalog;
pub use camera::{
    CameraSimulator, CameraSimulatorBuilder, TriggerState, DIAPHRAGM_OPENINGS, EXPOSURE_MAX_S,
    EXPOSURE_MIN_S, ISO_VALUES,
};
pub use common::{SimMode, SimRng, TimingConfig};
pub use velocity::{
    VelocityConfig, VelocitySimulator, VelocitySimulatorBuilder, WaveformGenerator,
    WaveformProfile, WaveformSample,
};
