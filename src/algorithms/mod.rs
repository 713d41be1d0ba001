//! Alignment algorithms

pub mod alignment;
pub mod correlation;
pub mod geodetic;
pub mod projection;
pub mod rotation;
pub mod scale;
pub mod similarity;

pub use alignment::{compute_alignment, Alignment, AlignmentDiagnostics, AlignmentEngine};
pub use correlation::TimeCorrelator;
pub use projection::{CoordinatesConverter, ProjectionRegistry};
pub use rotation::{RotationEstimate, RotationEstimator};
pub use scale::{ScaleEstimate, ScaleEstimator};
pub use similarity::{Anchor, PlacedMarker, SimilarityTransform};
