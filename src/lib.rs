//! # Inline Inspection Rig
//!
//! Application library for an inline inspection rig that watches a moving
//! surface (e.g. fabric on a conveyor). Two cooperating loops run against the
//! device seams defined in [`rig_core`]:
//!
//! - The **measurement loop** samples the velocity sensor, smooths the series
//!   and reports the surface velocity and displacement to a remote collector.
//! - The **capture loop** picks a capture cadence from the measured speed,
//!   then fires a green and a blue stereo capture every cycle and hands the
//!   batch to a bounded background dispatcher.
//!
//! ## Modules
//!
//! - **`collector`**: The [`collector::RemoteCollector`] seam, its HTTP
//!   implementation and an in-memory double.
//! - **`config`**: Layered configuration (TOML file plus `INSPECTION_*`
//!   environment variables) via `figment`.
//! - **`dispatch`**: Bounded delivery of picture batches off the capture path.
//! - **`error`**: The [`error::RigError`] type shared by the loops.
//! - **`orchestrator`**: Measurement, frequency search and the two loops.
//! - **`signal`**: Moving average, trapezoidal integration and rounding.
//! - **`tracing_setup`**: Subscriber initialization.
//!
//! Simulated devices live in [`rig_driver_sim`].

pub mod collector;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod signal;
pub mod tracing_setup;

pub use rig_core;
pub use rig_driver_sim;

pub use config::RigConfig;
pub use error::{RigError, RigResult};
pub use orchestrator::{CaptureOrchestrator, OrchestratorSettings};
