use std::fmt;
use thiserror::Error;

use crate::core::{FrameNumber, GeodeticPosition};
use crate::processing::parser::TelemetryError;
use crate::utils::config::ConfigError;

/// Failures of the geodetic projection boundary
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// No converter is registered under this name
    #[error("unsupported projection '{projection}'")]
    Unsupported { projection: String },

    /// Geodetic coordinate falls outside the projection's area of use
    #[error("coordinate (lon {longitude}, lat {latitude}) is outside the valid area of '{projection}'")]
    OutOfDomain {
        projection: String,
        longitude: f64,
        latitude: f64,
    },

    /// Planar position has no geodetic counterpart (non-finite result)
    #[error("position {position} cannot be transformed to {target}")]
    Untransformable {
        position: GeodeticPosition,
        target: String,
    },

    /// Round trip through geodetic coordinates failed while differencing
    #[error("failed to reproject {position} into '{target}': {cause}")]
    Reprojection {
        position: GeodeticPosition,
        target: String,
        #[source]
        cause: Box<ProjectionError>,
    },
}

/// Step of the alignment computation that ran out of data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentStage {
    Correlation,
    Scale,
    Rotation,
    PoseIndex,
}

impl fmt::Display for AlignmentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlignmentStage::Correlation => "time correlation",
            AlignmentStage::Scale => "scale estimation",
            AlignmentStage::Rotation => "rotation estimation",
            AlignmentStage::PoseIndex => "pose index",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the alignment engine.
///
/// None of these are retried internally: an alignment attempt either
/// produces a complete transform or fails as a whole.
#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("insufficient data for {stage}: {available} usable samples, {required} required")]
    InsufficientData {
        stage: AlignmentStage,
        required: usize,
        available: usize,
    },

    #[error("frame {frame} is outside the known range {first}..={last}")]
    FrameOutOfRange {
        frame: FrameNumber,
        first: FrameNumber,
        last: FrameNumber,
    },

    #[error(transparent)]
    MalformedTelemetry(#[from] TelemetryError),

    #[error("malformed reconstruction '{path}': {reason}")]
    MalformedReconstruction { path: String, reason: String },

    #[error("singular value decomposition of the cross-covariance matrix failed")]
    Decomposition,

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("alignment worker stopped without delivering a result")]
    WorkerLost,
}

pub type AlignmentResult<T> = Result<T, AlignmentError>;

impl AlignmentError {
    pub(crate) fn insufficient(stage: AlignmentStage, required: usize, available: usize) -> Self {
        AlignmentError::InsufficientData {
            stage,
            required,
            available,
        }
    }
}
