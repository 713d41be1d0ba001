//! Core data types shared by the alignment pipeline

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Video frame number, parsed from the reconstruction view file name
pub type FrameNumber = u32;

/// Frame duration as a rational number of seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBase {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeBase {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self { numerator, denominator }
    }

    /// Both parts non-zero; the frame conversions below assume this
    pub fn is_valid(&self) -> bool {
        self.numerator != 0 && self.denominator != 0
    }

    /// Presentation timestamp of a frame in seconds.
    ///
    /// Infinite or NaN for a zero denominator; see [`TimeBase::is_valid`].
    pub fn frame_seconds(&self, frame: FrameNumber) -> f64 {
        let pts = frame as u64 * self.numerator as u64;
        pts as f64 / self.denominator as f64
    }

    /// Frames per second implied by the time base
    pub fn frame_rate(&self) -> f64 {
        self.denominator as f64 / self.numerator as f64
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new(
            super::DEFAULT_TIME_BASE_NUMERATOR,
            super::DEFAULT_TIME_BASE_DENOMINATOR,
        )
    }
}

/// Point in a named planar projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeodeticPosition {
    pub projection: String,
    pub north: f64,
    pub east: f64,
    pub altitude: f64,
}

impl GeodeticPosition {
    pub fn new(projection: impl Into<String>, north: f64, east: f64, altitude: f64) -> Self {
        Self {
            projection: projection.into(),
            north,
            east,
            altitude,
        }
    }

    /// Whether both positions are expressed in the same projection
    pub fn same_projection(&self, other: &GeodeticPosition) -> bool {
        self.projection.eq_ignore_ascii_case(&other.projection)
    }

    /// Copy of this position moved vertically by `delta` meters
    pub fn raised(&self, delta: f64) -> Self {
        Self {
            altitude: self.altitude + delta,
            ..self.clone()
        }
    }
}

impl fmt::Display for GeodeticPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N {} E {} A {} ({})",
            self.north, self.east, self.altitude, self.projection
        )
    }
}

/// Named geodetic point to be placed in the world frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub name: String,
    pub position: GeodeticPosition,
}

impl Marker {
    pub fn new(name: impl Into<String>, position: GeodeticPosition) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// Camera pose as delivered by the reconstruction loader
#[derive(Debug, Clone, PartialEq)]
pub struct SfmPose {
    pub frame: FrameNumber,
    pub center: Vector3<f32>,
    pub rotation: Matrix3<f32>,
}

/// One projected telemetry fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnssSample {
    /// Whole seconds since the start of the recording
    pub timestamp_s: u32,
    pub position: GeodeticPosition,
    /// Height above the take-off point (meters)
    pub relative_height: f64,
}

/// Camera pose in the world (render) frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

/// Whether a pose was measured by the reconstruction or interpolated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoseState {
    Measured,
    Interpolated,
}

/// Result of a pose query for a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseQuery {
    pub frame: FrameNumber,
    pub pose: CameraPose,
    pub state: PoseState,
}

impl PoseQuery {
    /// True when the pose was taken verbatim from the reconstruction
    pub fn exact(&self) -> bool {
        self.state == PoseState::Measured
    }
}

/// Camera position paired with the GNSS fix recorded closest in time
#[derive(Debug, Clone, PartialEq)]
pub struct Correspondence {
    pub frame: FrameNumber,
    pub sfm: Vector3<f64>,
    pub gnss: GeodeticPosition,
}

/// Displacements of one correspondence relative to the alignment origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrespondencePair {
    pub sfm_displacement: Vector3<f64>,
    pub gnss_displacement: Vector3<f64>,
}
