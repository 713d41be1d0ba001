//! GNSS to reconstruction alignment
//!
//! Correlates frames with GNSS fixes, estimates scale and then rotation, and
//! composes the result into a [`SimilarityTransform`]. Any failure aborts
//! the whole alignment; no partial transform is produced.

use log::info;
use nalgebra::Vector3;
use serde::Serialize;
use std::path::Path;

use super::correlation::{relative_pairs, TimeCorrelator};
use super::projection::ProjectionRegistry;
use super::rotation::RotationEstimator;
use super::scale::ScaleEstimator;
use super::similarity::SimilarityTransform;
use crate::core::FrameNumber;
use crate::processing::pose_index::PoseTimeIndex;
use crate::processing::telemetry::GnssTrack;
use crate::utils::config::AlignmentConfig;
use crate::validation::{AlignmentError, AlignmentResult, AlignmentStage};

/// How well the correspondences constrained the transform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentDiagnostics {
    /// Frame whose pose and fix define the origin
    pub origin_frame: FrameNumber,
    pub correspondences: usize,
    pub scale_samples: usize,
    /// Singular values of the cross-covariance matrix, descending
    pub singular_values: Vector3<f64>,
    pub condition_ratio: f64,
    pub ill_conditioned: bool,
    pub reflection_corrected: bool,
}

/// Result of one alignment computation
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub transform: SimilarityTransform,
    pub diagnostics: AlignmentDiagnostics,
}

/// Runs the alignment steps with one configuration and projection registry
pub struct AlignmentEngine<'a> {
    config: &'a AlignmentConfig,
    registry: &'a ProjectionRegistry,
}

impl<'a> AlignmentEngine<'a> {
    pub fn new(config: &'a AlignmentConfig, registry: &'a ProjectionRegistry) -> Self {
        Self { config, registry }
    }

    /// Align the posed frames of `poses` with `track`
    pub fn compute(&self, poses: &PoseTimeIndex, track: &GnssTrack) -> AlignmentResult<Alignment> {
        let correspondences = TimeCorrelator::from_config(self.config).correlate(poses, track);
        let origin = correspondences
            .first()
            .ok_or_else(|| AlignmentError::insufficient(AlignmentStage::Correlation, 1, 0))?;

        let pairs = relative_pairs(&correspondences, self.registry)?;

        let scale = ScaleEstimator::from_config(self.config).estimate(&pairs)?;
        let rotation = RotationEstimator::from_config(self.config).estimate(&pairs, scale.scale)?;

        let transform = SimilarityTransform::new(origin.sfm, origin.gnss.clone(), scale.scale, rotation.rotation);
        let diagnostics = AlignmentDiagnostics {
            origin_frame: origin.frame,
            correspondences: correspondences.len(),
            scale_samples: scale.samples,
            singular_values: rotation.singular_values,
            condition_ratio: rotation.condition_ratio,
            ill_conditioned: rotation.is_ill_conditioned(self.config.ill_conditioned_ratio),
            reflection_corrected: rotation.reflection_corrected,
        };

        info!(
            "aligned {} correspondences: origin frame {} at {}, scale {:.6}",
            diagnostics.correspondences,
            origin.frame,
            origin.gnss,
            scale.scale
        );

        Ok(Alignment { transform, diagnostics })
    }
}

/// Load the caption file at `telemetry_path` and align it with `poses`
pub fn compute_alignment<P: AsRef<Path>>(
    telemetry_path: P,
    poses: &PoseTimeIndex,
    config: &AlignmentConfig,
    registry: &ProjectionRegistry,
) -> AlignmentResult<Alignment> {
    let track = GnssTrack::load(telemetry_path, &config.projection, registry)?;
    AlignmentEngine::new(config, registry).compute(poses, &track)
}
