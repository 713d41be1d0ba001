use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::core::{
    TimeBase, DEFAULT_PROJECTION, GNSS_TIME_OFFSET_S, MIN_GNSS_DISPLACEMENT_M, PARITY_WINDOW_HIGH,
    PARITY_WINDOW_LOW,
};

/// Parameters of one alignment computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Projection every GNSS fix is projected into
    pub projection: String,
    /// Seconds per video frame
    pub time_base: TimeBase,
    /// Offset subtracted from a frame timestamp before looking up its GNSS second
    pub gnss_time_offset_s: f64,
    /// Fractional-second window the first correlated frame must fall into
    pub parity_window: ParityWindow,
    /// Scale estimator used for this alignment
    pub scale_method: ScaleMethod,
    /// Minimum number of samples the scale estimator needs
    pub min_scale_samples: usize,
    /// Singular value ratio below which the rotation is reported unreliable
    pub ill_conditioned_ratio: f64,
    /// Reconstruction to renderer frame conversion
    pub camera_convention: CameraConvention,
}

/// Half-open window `(low, high]` on the fractional part of a timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParityWindow {
    pub low: f64,
    pub high: f64,
}

impl ParityWindow {
    pub fn contains(&self, fraction: f64) -> bool {
        fraction > self.low && fraction <= self.high
    }
}

impl Default for ParityWindow {
    fn default() -> Self {
        Self {
            low: PARITY_WINDOW_LOW,
            high: PARITY_WINDOW_HIGH,
        }
    }
}

/// Scale estimation algorithm; exactly one is used per alignment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ScaleMethod {
    /// Mean of `|sfm| / |gnss|` over non-origin pairs with a large enough GNSS displacement
    PerSampleRatio { min_gnss_displacement_m: f64 },
    /// Least squares over the distances between every two correspondences
    PairwiseMagnitude,
}

impl Default for ScaleMethod {
    fn default() -> Self {
        ScaleMethod::PerSampleRatio {
            min_gnss_displacement_m: MIN_GNSS_DISPLACEMENT_M,
        }
    }
}

/// How reconstruction camera poses map into the renderer frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConvention {
    /// Mirror the X axis (right-handed to left-handed)
    pub mirror_x: bool,
    /// Rotate each camera 180 degrees about its own Z axis
    pub roll_180: bool,
}

impl CameraConvention {
    /// Use reconstruction poses unchanged
    pub fn identity() -> Self {
        Self {
            mirror_x: false,
            roll_180: false,
        }
    }
}

impl Default for CameraConvention {
    fn default() -> Self {
        Self {
            mirror_x: true,
            roll_180: true,
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            projection: DEFAULT_PROJECTION.to_string(),
            time_base: TimeBase::default(),
            gnss_time_offset_s: GNSS_TIME_OFFSET_S,
            parity_window: ParityWindow::default(),
            scale_method: ScaleMethod::default(),
            min_scale_samples: 1,
            ill_conditioned_ratio: 1e-6,
            camera_convention: CameraConvention::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid parameter value
    #[error("invalid value '{value}' for {parameter}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    /// Configuration file I/O error
    #[error("configuration I/O error: {message}")]
    IoError { message: String },
    /// JSON serialization/deserialization error
    #[error("configuration serialization error: {message}")]
    SerializationError { message: String },
}

/// Configuration validation result
#[derive(Debug)]
pub struct ValidationResult {
    /// Whether configuration is valid
    pub is_valid: bool,
    /// Validation errors
    pub errors: Vec<ConfigError>,
    /// Validation warnings
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// First error, if the configuration is invalid
    pub fn into_result(self) -> Result<(), ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl AlignmentConfig {
    /// Check every parameter, collecting all errors and warnings
    pub fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.projection.trim().is_empty() {
            errors.push(invalid("projection", &self.projection, "Projection name must not be empty"));
        }

        if !self.time_base.is_valid() {
            errors.push(invalid(
                "time_base",
                format!("{}/{}", self.time_base.numerator, self.time_base.denominator),
                "Time base numerator and denominator must be non-zero",
            ));
        } else {
            let fps = self.time_base.frame_rate();
            if !(1.0..=240.0).contains(&fps) {
                warnings.push(format!("Unusual frame rate {:.3} fps", fps));
            }
        }

        if !self.gnss_time_offset_s.is_finite() {
            errors.push(invalid(
                "gnss_time_offset_s",
                self.gnss_time_offset_s,
                "GNSS time offset must be finite",
            ));
        }

        let window = self.parity_window;
        if !(0.0..=1.0).contains(&window.low) || !(0.0..=1.0).contains(&window.high) || window.low >= window.high {
            errors.push(invalid(
                "parity_window",
                format!("({}, {}]", window.low, window.high),
                "Parity window must be a non-empty sub-interval of [0, 1]",
            ));
        }

        if let ScaleMethod::PerSampleRatio {
            min_gnss_displacement_m,
        } = self.scale_method
        {
            if !(min_gnss_displacement_m >= 0.0) {
                errors.push(invalid(
                    "scale_method.min_gnss_displacement_m",
                    min_gnss_displacement_m,
                    "Displacement cutoff must be non-negative",
                ));
            } else if min_gnss_displacement_m == 0.0 {
                warnings.push("Zero displacement cutoff admits near-origin samples".to_string());
            }
        }

        if self.min_scale_samples == 0 {
            errors.push(invalid(
                "min_scale_samples",
                self.min_scale_samples,
                "At least one scale sample is required",
            ));
        }

        if !(self.ill_conditioned_ratio > 0.0) {
            errors.push(invalid(
                "ill_conditioned_ratio",
                self.ill_conditioned_ratio,
                "Conditioning ratio must be positive",
            ));
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Loads, validates and persists an [`AlignmentConfig`]
#[derive(Debug, Default)]
pub struct ConfigurationManager {
    config: AlignmentConfig,
    config_file_path: Option<String>,
    is_modified: bool,
}

impl ConfigurationManager {
    /// Create a new configuration manager with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration manager and load from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    /// Current configuration
    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    /// Replace the configuration after validating it
    pub fn update_config(&mut self, config: AlignmentConfig) -> Result<(), ConfigError> {
        config.validate().into_result()?;
        self.config = config;
        self.is_modified = true;
        Ok(())
    }

    /// Switch the target projection, returning the previous one
    pub fn set_projection(&mut self, projection: &str) -> Result<String, ConfigError> {
        if projection.trim().is_empty() {
            return Err(invalid("projection", projection, "Projection name must not be empty"));
        }
        self.is_modified = true;
        Ok(std::mem::replace(&mut self.config.projection, projection.to_string()))
    }

    /// Switch the scale estimator, returning the previous one
    pub fn set_scale_method(&mut self, method: ScaleMethod) -> Result<ScaleMethod, ConfigError> {
        let mut candidate = self.config.clone();
        candidate.scale_method = method;
        candidate.validate().into_result()?;
        self.is_modified = true;
        Ok(std::mem::replace(&mut self.config.scale_method, method))
    }

    /// Load configuration from JSON file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: AlignmentConfig = serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to parse config file '{}': {}", path_str, e),
        })?;

        let validation = config.validate();
        for warning in &validation.warnings {
            log::warn!("{}: {}", path_str, warning);
        }
        validation.into_result()?;

        self.config = config;
        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save configuration to JSON file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(&self.config).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })?;

        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save to the currently loaded file path
    pub fn save(&mut self) -> Result<(), ConfigError> {
        if let Some(path) = self.config_file_path.clone() {
            self.save_to_file(path)
        } else {
            Err(ConfigError::IoError {
                message: "No file path set for saving configuration".to_string(),
            })
        }
    }

    /// Check if configuration has been modified since last save
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }
}
