//! Data records produced by the rig.
//!
//! A capture cycle produces one [`StereoCapture`] per light type. The orchestrator
//! stamps each one with the surface movement at capture time, yielding a
//! [`CapturedLight`], and hands the ordered [`LightBatch`] to the collector.
//!
//! Image buffers are [`Bytes`]: cloning a picture gives the receiver its own
//! handle on immutable data, so a dispatched batch never aliases orchestrator state.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Illumination used for a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightType {
    #[serde(rename = "green_light")]
    Green,
    #[serde(rename = "blue_light")]
    Blue,
}

impl LightType {
    /// Order in which lights are captured within one cycle.
    pub const CAPTURE_ORDER: [LightType; 2] = [LightType::Green, LightType::Blue];

    /// Wire name used by the remote collector.
    pub fn as_str(&self) -> &'static str {
        match self {
            LightType::Green => "green_light",
            LightType::Blue => "blue_light",
        }
    }
}

impl fmt::Display for LightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a camera in the stereo pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraPosition {
    Left,
    Right,
}

impl CameraPosition {
    /// Both positions, left first.
    pub const ALL: [CameraPosition; 2] = [CameraPosition::Left, CameraPosition::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraPosition::Left => "left",
            CameraPosition::Right => "right",
        }
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One camera's image and the exposure settings it was taken with.
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    /// Raw image buffer
    pub image: Bytes,
    /// Exposure time in seconds
    pub exposure_time_s: f64,
    /// Diaphragm opening (f-number)
    pub diaphragm_opening: f64,
    /// ISO sensitivity
    pub iso: u32,
}

/// Result of a single trigger/collect cycle on the stereo pair.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoCapture {
    pub light: LightType,
    pub left: Picture,
    pub right: Picture,
}

/// A stereo capture stamped with the surface movement at capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedLight {
    pub light: LightType,
    pub created_at: DateTime<Utc>,
    /// Surface velocity in cm/min
    pub surface_velocity: f64,
    /// Surface displacement since the previous image
    pub surface_displacement: f64,
    pub left: Picture,
    pub right: Picture,
}

impl CapturedLight {
    pub fn new(
        capture: StereoCapture,
        created_at: DateTime<Utc>,
        surface_velocity: f64,
        surface_displacement: f64,
    ) -> Self {
        Self {
            light: capture.light,
            created_at,
            surface_velocity,
            surface_displacement,
            left: capture.left,
            right: capture.right,
        }
    }
}

/// Lights collected within one capture cycle, in capture order.
pub type LightBatch = Vec<CapturedLight>;

/// Velocity and displacement reported by the measurement loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMovement {
    pub velocity: f64,
    pub displacement: f64,
}
