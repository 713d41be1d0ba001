//! Error taxonomy of the alignment engine

pub mod error;

pub use error::{AlignmentError, AlignmentResult, AlignmentStage, ProjectionError};
