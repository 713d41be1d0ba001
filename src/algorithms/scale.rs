//! Uniform scale between GNSS meters and reconstruction units

use log::{debug, warn};

use crate::core::CorrespondencePair;
use crate::utils::config::{AlignmentConfig, ScaleMethod};
use crate::validation::{AlignmentError, AlignmentResult, AlignmentStage};

/// Estimated scale and the number of samples it rests on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleEstimate {
    /// Reconstruction units per GNSS meter
    pub scale: f64,
    pub samples: usize,
}

#[derive(Debug, Clone)]
pub struct ScaleEstimator {
    method: ScaleMethod,
    min_samples: usize,
}

impl ScaleEstimator {
    pub fn new(method: ScaleMethod) -> Self {
        Self { method, min_samples: 1 }
    }

    pub fn from_config(config: &AlignmentConfig) -> Self {
        Self {
            method: config.scale_method,
            min_samples: config.min_scale_samples.max(1),
        }
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples.max(1);
        self
    }

    pub fn method(&self) -> ScaleMethod {
        self.method
    }

    /// Estimate the scale from pairs relative to the origin.
    ///
    /// `pairs[0]` must be the origin pair, as produced by
    /// [`relative_pairs`](super::correlation::relative_pairs).
    pub fn estimate(&self, pairs: &[CorrespondencePair]) -> AlignmentResult<ScaleEstimate> {
        let estimate = match self.method {
            ScaleMethod::PerSampleRatio {
                min_gnss_displacement_m,
            } => self.per_sample_ratio(pairs, min_gnss_displacement_m)?,
            ScaleMethod::PairwiseMagnitude => self.pairwise_magnitude(pairs)?,
        };

        if !estimate.scale.is_finite() || estimate.scale <= 0.0 {
            warn!("degenerate scale {} from {} samples", estimate.scale, estimate.samples);
            return Err(AlignmentError::insufficient(
                AlignmentStage::Scale,
                self.min_samples,
                estimate.samples,
            ));
        }

        debug!("scale {} from {} samples ({:?})", estimate.scale, estimate.samples, self.method);
        Ok(estimate)
    }

    fn per_sample_ratio(&self, pairs: &[CorrespondencePair], cutoff: f64) -> AlignmentResult<ScaleEstimate> {
        let ratios: Vec<f64> = pairs
            .iter()
            .skip(1)
            .filter_map(|pair| {
                let gnss = pair.gnss_displacement.norm();
                if gnss < cutoff || gnss == 0.0 {
                    return None;
                }
                Some(pair.sfm_displacement.norm() / gnss)
            })
            .collect();

        if ratios.len() < self.min_samples {
            return Err(AlignmentError::insufficient(
                AlignmentStage::Scale,
                self.min_samples,
                ratios.len(),
            ));
        }

        Ok(ScaleEstimate {
            scale: ratios.iter().sum::<f64>() / ratios.len() as f64,
            samples: ratios.len(),
        })
    }

    fn pairwise_magnitude(&self, pairs: &[CorrespondencePair]) -> AlignmentResult<ScaleEstimate> {
        let mut sfm_dot_gnss = 0.0;
        let mut gnss_dot_gnss = 0.0;
        let mut samples = 0usize;

        for (i, a) in pairs.iter().enumerate() {
            for b in &pairs[i + 1..] {
                let gnss = (a.gnss_displacement - b.gnss_displacement).norm();
                if gnss == 0.0 {
                    continue;
                }
                let sfm = (a.sfm_displacement - b.sfm_displacement).norm();
                sfm_dot_gnss += sfm * gnss;
                gnss_dot_gnss += gnss * gnss;
                samples += 1;
            }
        }

        if samples < self.min_samples {
            return Err(AlignmentError::insufficient(AlignmentStage::Scale, self.min_samples, samples));
        }

        Ok(ScaleEstimate {
            scale: sfm_dot_gnss / gnss_dot_gnss,
            samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const PER_SAMPLE: ScaleMethod = ScaleMethod::PerSampleRatio {
        min_gnss_displacement_m: 25.0,
    };

    fn synthetic_pairs(true_scale: f64, noise: f64, count: usize) -> Vec<CorrespondencePair> {
        let mut rng = StdRng::seed_from_u64(7);
        let rotation = Rotation3::from_euler_angles(0.2, -1.1, 2.4);

        let mut pairs = vec![CorrespondencePair {
            sfm_displacement: Vector3::zeros(),
            gnss_displacement: Vector3::zeros(),
        }];
        for _ in 0..count {
            let gnss = Vector3::new(
                rng.gen_range(-200.0..200.0),
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-200.0..200.0),
            );
            let jitter = Vector3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ) * noise;
            pairs.push(CorrespondencePair {
                sfm_displacement: rotation * (gnss * true_scale) + jitter,
                gnss_displacement: gnss,
            });
        }
        pairs
    }

    #[test]
    fn test_per_sample_ratio_recovers_scale() {
        let pairs = synthetic_pairs(0.037, 0.0, 40);
        let estimate = ScaleEstimator::new(PER_SAMPLE).estimate(&pairs).unwrap();
        assert!((estimate.scale - 0.037).abs() < 1e-12);
        assert!(estimate.samples <= 40);
    }

    #[test]
    fn test_pairwise_magnitude_recovers_scale() {
        let pairs = synthetic_pairs(0.037, 0.0, 40);
        let estimate = ScaleEstimator::new(ScaleMethod::PairwiseMagnitude)
            .estimate(&pairs)
            .unwrap();
        assert!((estimate.scale - 0.037).abs() < 1e-12);
        assert_eq!(estimate.samples, 41 * 40 / 2);
    }

    #[test]
    fn test_noise_converges_for_both_methods() {
        for method in [PER_SAMPLE, ScaleMethod::PairwiseMagnitude] {
            let coarse = ScaleEstimator::new(method).estimate(&synthetic_pairs(2.5, 1.0, 60)).unwrap();
            let fine = ScaleEstimator::new(method).estimate(&synthetic_pairs(2.5, 0.001, 60)).unwrap();
            assert!((coarse.scale - 2.5).abs() < 0.05, "{method:?}: {}", coarse.scale);
            assert!((fine.scale - 2.5).abs() < 1e-4, "{method:?}: {}", fine.scale);
        }
    }

    #[test]
    fn test_short_displacements_are_filtered() {
        let pairs = vec![
            CorrespondencePair {
                sfm_displacement: Vector3::zeros(),
                gnss_displacement: Vector3::zeros(),
            },
            CorrespondencePair {
                sfm_displacement: Vector3::new(100.0, 0.0, 0.0),
                gnss_displacement: Vector3::new(10.0, 0.0, 0.0),
            },
            CorrespondencePair {
                sfm_displacement: Vector3::new(0.0, 0.0, 60.0),
                gnss_displacement: Vector3::new(0.0, 0.0, 30.0),
            },
        ];
        let estimate = ScaleEstimator::new(PER_SAMPLE).estimate(&pairs).unwrap();
        assert_eq!(estimate.samples, 1);
        assert_eq!(estimate.scale, 2.0);
    }

    #[test]
    fn test_no_pairs_is_insufficient() {
        for method in [PER_SAMPLE, ScaleMethod::PairwiseMagnitude] {
            let result = ScaleEstimator::new(method).estimate(&[]);
            assert!(matches!(
                result,
                Err(AlignmentError::InsufficientData {
                    stage: AlignmentStage::Scale,
                    available: 0,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_origin_only_is_insufficient() {
        let origin = CorrespondencePair {
            sfm_displacement: Vector3::zeros(),
            gnss_displacement: Vector3::zeros(),
        };
        let method = ScaleMethod::PerSampleRatio {
            min_gnss_displacement_m: 0.0,
        };
        assert!(ScaleEstimator::new(method).estimate(&[origin]).is_err());
        assert!(ScaleEstimator::new(ScaleMethod::PairwiseMagnitude).estimate(&[origin]).is_err());
    }

    #[test]
    fn test_min_samples_is_enforced() {
        let pairs = synthetic_pairs(1.0, 0.0, 3);
        let result = ScaleEstimator::new(ScaleMethod::PerSampleRatio {
            min_gnss_displacement_m: 0.0,
        })
        .with_min_samples(5)
        .estimate(&pairs);
        assert!(matches!(
            result,
            Err(AlignmentError::InsufficientData {
                required: 5,
                available: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_collapsed_reconstruction_is_rejected() {
        let pairs: Vec<CorrespondencePair> = synthetic_pairs(1.0, 0.0, 5)
            .into_iter()
            .map(|p| CorrespondencePair {
                sfm_displacement: Vector3::zeros(),
                ..p
            })
            .collect();
        let result = ScaleEstimator::new(PER_SAMPLE).estimate(&pairs);
        assert!(matches!(result, Err(AlignmentError::InsufficientData { .. })));
    }

    #[test]
    fn test_degenerate_scale_reports_used_samples() {
        let pairs: Vec<CorrespondencePair> = synthetic_pairs(1.0, 0.0, 5)
            .into_iter()
            .map(|p| CorrespondencePair {
                sfm_displacement: Vector3::zeros(),
                ..p
            })
            .collect();
        let result = ScaleEstimator::new(ScaleMethod::PairwiseMagnitude).estimate(&pairs);
        // every pair of the six correspondences was usable
        assert!(matches!(
            result,
            Err(AlignmentError::InsufficientData {
                stage: AlignmentStage::Scale,
                available: 15,
                ..
            })
        ));
    }
}
