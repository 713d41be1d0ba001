//! GNSS Alignment
//!
//! Aligns a structure-from-motion reconstruction of drone video with the
//! GNSS track recorded alongside it, producing a similarity transform that
//! places geodetic positions in the reconstruction frame.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use core::{CameraPose, FrameNumber, GeodeticPosition, Marker, PoseQuery, PoseState, TimeBase};
pub use algorithms::{
    compute_alignment, Alignment, AlignmentEngine, ProjectionRegistry, SimilarityTransform, TimeCorrelator,
};
pub use processing::{plan_chunks, ChunkSequence, ChunkTracker, GnssTrack, PoseTimeIndex};
pub use validation::{AlignmentError, AlignmentResult, ProjectionError};
pub use utils::{AlignmentConfig, ConfigurationManager};
pub use api::{spawn_alignment, AlignmentReport, AlignmentSession, TransformCell};
