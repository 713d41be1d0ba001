//! Alignment session: projection registry, configuration and pose index
//! for one video

use log::info;
use std::path::Path;
use std::sync::Arc;

use crate::algorithms::alignment::{compute_alignment, Alignment};
use crate::algorithms::projection::ProjectionRegistry;
use crate::core::{FrameNumber, Marker, PoseQuery};
use crate::processing::pose_index::PoseTimeIndex;
use crate::processing::reconstruction::load_reconstruction;
use crate::processing::telemetry::GnssTrack;
use crate::utils::config::AlignmentConfig;
use crate::validation::AlignmentResult;

/// Owns everything an alignment needs.
///
/// The pose index is shared read-only with alignment workers once loading
/// is done.
#[derive(Debug, Clone)]
pub struct AlignmentSession {
    registry: Arc<ProjectionRegistry>,
    config: AlignmentConfig,
    poses: Arc<PoseTimeIndex>,
}

impl AlignmentSession {
    /// Create a session after validating `config`
    pub fn new(config: AlignmentConfig, registry: ProjectionRegistry) -> AlignmentResult<Self> {
        config.validate().into_result()?;
        Ok(Self {
            registry: Arc::new(registry),
            config,
            poses: Arc::new(PoseTimeIndex::new()),
        })
    }

    /// Session with the SWEREF 99 projections registered
    pub fn with_defaults(config: AlignmentConfig) -> AlignmentResult<Self> {
        Self::new(config, ProjectionRegistry::with_sweref_zones())
    }

    /// Use an already built pose index
    pub fn with_poses(mut self, poses: PoseTimeIndex) -> Self {
        self.poses = Arc::new(poses);
        self
    }

    /// Load reconstruction chunk files in order; frames already posed by an
    /// earlier chunk keep their first pose. Returns the number of new frames.
    pub fn load_reconstructions<P: AsRef<Path>>(&mut self, paths: &[P]) -> AlignmentResult<usize> {
        let mut index = (*self.poses).clone();
        let mut added = 0;
        for path in paths {
            let poses = load_reconstruction(path)?;
            added += index.extend_sfm_poses(poses, &self.config.camera_convention);
        }
        info!("pose index holds {} frames", index.len());
        self.poses = Arc::new(index);
        Ok(added)
    }

    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ProjectionRegistry> {
        &self.registry
    }

    pub fn poses(&self) -> &Arc<PoseTimeIndex> {
        &self.poses
    }

    /// Align the loaded reconstruction with the captions at `telemetry_path`
    pub fn compute_alignment<P: AsRef<Path>>(&self, telemetry_path: P) -> AlignmentResult<Alignment> {
        compute_alignment(telemetry_path, &self.poses, &self.config, &self.registry)
    }

    /// Pose of `frame`, measured or interpolated
    pub fn get_pose(&self, frame: FrameNumber) -> AlignmentResult<PoseQuery> {
        self.poses.get_pose(frame)
    }

    /// Ground markers below every GNSS fix of a caption file
    pub fn gnss_markers<P: AsRef<Path>>(&self, telemetry_path: P) -> AlignmentResult<Vec<Marker>> {
        let track = GnssTrack::load(telemetry_path, &self.config.projection, &self.registry)?;
        Ok(track.markers())
    }
}
