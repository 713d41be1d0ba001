//! Utility modules

pub mod config;

pub use config::{AlignmentConfig, CameraConvention, ConfigError, ConfigurationManager, ParityWindow, ScaleMethod};
