//! Pairing reconstructed frames with GNSS fixes by time

use log::{debug, trace};

use crate::algorithms::projection::ProjectionRegistry;
use crate::core::{Correspondence, CorrespondencePair, FrameNumber, TimeBase, GNSS_TIME_OFFSET_S};
use crate::processing::pose_index::PoseTimeIndex;
use crate::processing::telemetry::GnssTrack;
use crate::utils::config::{AlignmentConfig, ParityWindow};
use crate::validation::ProjectionError;

/// Selects frames recorded close to a GNSS fix and pairs them with it.
///
/// Fixes are taken on half seconds while the reconstruction samples roughly
/// two frames per second, so every second known frame is used, starting
/// with the one whose timestamp lies nearest a half second.
#[derive(Debug, Clone)]
pub struct TimeCorrelator {
    time_base: TimeBase,
    gnss_time_offset_s: f64,
    parity_window: ParityWindow,
}

impl TimeCorrelator {
    pub fn new(time_base: TimeBase) -> Self {
        Self {
            time_base,
            gnss_time_offset_s: GNSS_TIME_OFFSET_S,
            parity_window: ParityWindow::default(),
        }
    }

    pub fn from_config(config: &AlignmentConfig) -> Self {
        Self {
            time_base: config.time_base,
            gnss_time_offset_s: config.gnss_time_offset_s,
            parity_window: config.parity_window,
        }
    }

    /// GNSS second recorded closest to `frame`
    pub fn gnss_second(&self, frame: FrameNumber) -> u32 {
        let ts = self.time_base.frame_seconds(frame) - self.gnss_time_offset_s;
        ts.round_ties_even().max(0.0) as u32
    }

    /// Index of the first frame to use: 0 when the first frame lies inside
    /// the parity window, 1 otherwise
    pub fn start_index(&self, frames: &[FrameNumber]) -> usize {
        match frames.first() {
            Some(&first) => {
                let fraction = self.time_base.frame_seconds(first).fract();
                if self.parity_window.contains(fraction) {
                    0
                } else {
                    1
                }
            }
            None => 0,
        }
    }

    /// Every second frame from the start index, with its GNSS second
    pub fn select_frames<'a>(&'a self, frames: &'a [FrameNumber]) -> impl Iterator<Item = (FrameNumber, u32)> + 'a {
        frames
            .iter()
            .skip(self.start_index(frames))
            .step_by(2)
            .map(move |&frame| (frame, self.gnss_second(frame)))
    }

    /// Correspondences in ascending frame order.
    ///
    /// Selected frames without a fix for their second are skipped.
    pub fn correlate(&self, poses: &PoseTimeIndex, track: &GnssTrack) -> Vec<Correspondence> {
        let frames = poses.frames();
        let mut correspondences = Vec::new();

        for (frame, second) in self.select_frames(&frames) {
            let Some(sample) = track.get(second) else {
                trace!("frame {}: no GNSS fix for second {}", frame, second);
                continue;
            };
            let Some(sfm) = poses.position(frame) else {
                continue;
            };
            correspondences.push(Correspondence {
                frame,
                sfm,
                gnss: sample.position.clone(),
            });
        }

        debug!(
            "correlated {} of {} frames with GNSS fixes",
            correspondences.len(),
            frames.len()
        );
        correspondences
    }
}

/// Displacements of every correspondence from `correspondences[0]`.
///
/// The first returned pair is the origin itself (both displacements zero).
pub fn relative_pairs(
    correspondences: &[Correspondence],
    registry: &ProjectionRegistry,
) -> Result<Vec<CorrespondencePair>, ProjectionError> {
    let Some(origin) = correspondences.first() else {
        return Ok(Vec::new());
    };

    correspondences
        .iter()
        .map(|c| {
            Ok(CorrespondencePair {
                sfm_displacement: c.sfm - origin.sfm,
                gnss_displacement: origin.gnss.displacement_to(&c.gnss, registry)?,
            })
        })
        .collect()
}
