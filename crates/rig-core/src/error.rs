//! Device error taxonomy.
//!
//! Errors fall into two groups:
//!
//! 1. **Protocol errors** - `NotReady`, `NotYetTriggered`
//!    - Raised when the trigger/collect sequence is used out of order
//!    - Recovery: the capture loop logs a warning and retries on the next cycle
//!
//! 2. **Configuration errors** - `AssetNotFound`
//!    - The simulator has no image for a (light, position) pair
//!    - Recovery: none, fix the asset catalog and restart

use crate::data::{CameraPosition, LightType};
use thiserror::Error;

/// Convenience alias for results returned by devices.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The device was used before `open()`.
    #[error("Cameras are not ready to be used")]
    NotReady,

    /// `collect()` was called without an outstanding trigger.
    #[error("Pictures are not ready: the trigger was not set")]
    NotYetTriggered,

    /// No image asset exists for the requested light and camera position.
    #[error("Picture asset not found for {position} camera under {light}: {detail}")]
    AssetNotFound {
        light: LightType,
        position: CameraPosition,
        detail: String,
    },
}

impl DeviceError {
    /// Whether the error only degrades the current capture cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeviceError::NotReady | DeviceError::NotYetTriggered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_are_transient() {
        assert!(DeviceError::NotReady.is_transient());
        assert!(DeviceError::NotYetTriggered.is_transient());
    }

    #[test]
    fn missing_asset_is_not_transient() {
        let err = DeviceError::AssetNotFound {
            light: LightType::Blue,
            position: CameraPosition::Right,
            detail: "no catalog entry".into(),
        };
        assert!(!err.is_transient());
        let message = err.to_string();
        assert!(message.contains("right"));
        assert!(message.contains("blue_light"));
    }
}
