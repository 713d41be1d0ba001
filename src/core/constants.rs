//! Empirical constants of the capture setup

/// Projection used for drone telemetry unless configured otherwise
pub const DEFAULT_PROJECTION: &str = "sweref_99_13_30";

/// NTSC frame duration numerator (seconds per frame = 1001 / 30000)
pub const DEFAULT_TIME_BASE_NUMERATOR: u32 = 1001;

/// NTSC frame duration denominator
pub const DEFAULT_TIME_BASE_DENOMINATOR: u32 = 30000;

/// Subtitle timestamps run this many seconds ahead of the recorded GNSS fix
pub const GNSS_TIME_OFFSET_S: f64 = 0.5;

/// GNSS displacements shorter than this are too noisy for a scale ratio (meters)
pub const MIN_GNSS_DISPLACEMENT_M: f64 = 25.0;

/// Fractional-second window, lower bound exclusive, for the first paired frame
pub const PARITY_WINDOW_LOW: f64 = 0.25;

/// Fractional-second window, upper bound inclusive, for the first paired frame
pub const PARITY_WINDOW_HIGH: f64 = 0.75;
