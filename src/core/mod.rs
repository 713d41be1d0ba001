//! Core types and constants for the GNSS alignment engine

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
