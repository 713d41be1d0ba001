//! Optimal rotation between scaled GNSS and reconstruction displacements
//! (orthogonal Procrustes / Kabsch).

use log::{debug, warn};
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

use crate::core::CorrespondencePair;
use crate::utils::config::AlignmentConfig;
use crate::validation::{AlignmentError, AlignmentResult, AlignmentStage};

/// Orientation whose local Z axis is the third column and Y axis the second
/// column of `rotation`
pub fn rotation_to_quaternion(rotation: &Matrix3<f64>) -> UnitQuaternion<f64> {
    let forward = rotation.column(2).into_owned();
    let up = rotation.column(1).into_owned();
    UnitQuaternion::face_towards(&forward, &up)
}

/// Rotation with the diagnostics of the decomposition it came from
#[derive(Debug, Clone, PartialEq)]
pub struct RotationEstimate {
    /// Maps scaled GNSS displacements onto reconstruction displacements
    pub rotation: Rotation3<f64>,
    pub quaternion: UnitQuaternion<f64>,
    /// Singular values of the cross-covariance matrix, descending
    pub singular_values: Vector3<f64>,
    /// Second largest over largest singular value; near zero for collinear data
    pub condition_ratio: f64,
    /// The raw SVD solution was a reflection and had its last axis flipped
    pub reflection_corrected: bool,
}

impl RotationEstimate {
    pub fn is_ill_conditioned(&self, threshold: f64) -> bool {
        !(self.condition_ratio >= threshold)
    }

    /// Smallest singular value of the cross-covariance matrix
    pub fn smallest_singular_value(&self) -> f64 {
        self.singular_values.min()
    }
}

#[derive(Debug, Clone)]
pub struct RotationEstimator {
    ill_conditioned_ratio: f64,
}

impl Default for RotationEstimator {
    fn default() -> Self {
        Self {
            ill_conditioned_ratio: 1e-6,
        }
    }
}

impl RotationEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AlignmentConfig) -> Self {
        Self {
            ill_conditioned_ratio: config.ill_conditioned_ratio,
        }
    }

    /// `B = Σ sfm_i · (scale · gnss_i)ᵀ`
    pub fn cross_covariance(pairs: &[CorrespondencePair], scale: f64) -> Matrix3<f64> {
        pairs.iter().fold(Matrix3::zeros(), |b, pair| {
            b + pair.sfm_displacement * (pair.gnss_displacement * scale).transpose()
        })
    }

    /// Proper rotation `R` minimizing `Σ |sfm_i - R · scale · gnss_i|²`
    pub fn estimate(&self, pairs: &[CorrespondencePair], scale: f64) -> AlignmentResult<RotationEstimate> {
        let b = Self::cross_covariance(pairs, scale);

        let svd = b.svd(true, true);
        let u = svd.u.ok_or(AlignmentError::Decomposition)?;
        let v_t = svd.v_t.ok_or(AlignmentError::Decomposition)?;
        let singular_values = svd.singular_values;

        let largest = singular_values.max();
        if !(largest > 0.0) {
            return Err(AlignmentError::insufficient(
                AlignmentStage::Rotation,
                1,
                pairs.iter().filter(|p| p.gnss_displacement != Vector3::zeros()).count(),
            ));
        }

        // flip the axis of the smallest singular value so det(R) = +1
        let d = u.determinant() * v_t.determinant();
        let reflection_corrected = d < 0.0;
        let mut correction = Vector3::repeat(1.0);
        if reflection_corrected {
            correction[singular_values.imin()] = -1.0;
        }

        let r = u * Matrix3::from_diagonal(&correction) * v_t;
        let rotation = Rotation3::from_matrix_unchecked(r);
        let quaternion = rotation_to_quaternion(&r);

        let mut sorted = [singular_values[0], singular_values[1], singular_values[2]];
        sorted.sort_by(|a, b| b.total_cmp(a));
        let condition_ratio = sorted[1] / sorted[0];

        let estimate = RotationEstimate {
            rotation,
            quaternion,
            singular_values: Vector3::from(sorted),
            condition_ratio,
            reflection_corrected,
        };

        if estimate.is_ill_conditioned(self.ill_conditioned_ratio) {
            warn!(
                "cross-covariance is ill-conditioned (singular values {:?}); rotation is unreliable",
                sorted
            );
        }
        debug!(
            "rotation {:?}, singular values {:?}, reflection corrected: {}",
            quaternion.euler_angles(),
            sorted,
            reflection_corrected
        );

        Ok(estimate)
    }
}
