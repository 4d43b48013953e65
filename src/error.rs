//! Error types for the inspection rig.
//!
//! This module defines the application error type, `RigError`. Using the
//! `thiserror` crate, it gathers the failure sources of the rig in one place.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps figment errors, raised when a configuration file or
//!   environment override cannot be parsed.
//! - **`Configuration`**: Semantic errors in a configuration that parsed fine
//!   (e.g. a moving average window of 0). Caught by `RigConfig::validate`.
//! - **`InsufficientData`**: A displacement was requested over fewer than two
//!   velocity samples.
//! - **`Device`**: Errors from the velocity sensor or the stereo cameras. See
//!   [`DeviceError::is_transient`] for which ones only cost a capture cycle.
//! - **`Collector`**: Transport failures talking to the remote collector. The
//!   loops log these and carry on.
//! - **`Io`**: Wraps `std::io::Error`.
//!
//! With `#[from]`, the `?` operator lifts each source into `RigError`.

use crate::collector::CollectorError;
use rig_core::DeviceError;
use thiserror::Error;

/// Convenience alias for results using the rig error type.
pub type RigResult<T> = std::result::Result<T, RigError>;

#[derive(Error, Debug)]
pub enum RigError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Not enough velocity samples to integrate: got {samples}, need at least 2")]
    InsufficientData { samples: usize },

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Collector error: {0}")]
    Collector(#[from] CollectorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for RigError {
    fn from(err: figment::Error) -> Self {
        RigError::Config(Box::new(err))
    }
}

impl RigError {
    /// Whether the error only costs the current cycle of a loop.
    pub fn is_transient(&self) -> bool {
        match self {
            RigError::Device(err) => err.is_transient(),
            RigError::Collector(_) => true,
            _ => false,
        }
    }
}
