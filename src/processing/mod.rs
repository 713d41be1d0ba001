//! Input loading and frame bookkeeping

pub mod chunks;
pub mod parser;
pub mod pose_index;
pub mod reconstruction;
pub mod telemetry;

pub use chunks::{plan_chunks, ChunkSequence, ChunkTracker};
pub use parser::{parse_telemetry, DjiCaptionParser, SrtReader, TelemetryError, TelemetryRecord};
pub use pose_index::{CameraPoseInterpolator, PoseTimeIndex};
pub use reconstruction::load_reconstruction;
pub use telemetry::GnssTrack;
