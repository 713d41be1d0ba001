//! Frame-keyed camera poses with interpolation between known frames

use log::trace;
use nalgebra::Vector3;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use crate::core::{CameraPose, FrameNumber, PoseQuery, PoseState, SfmPose};
use crate::utils::config::CameraConvention;
use crate::validation::{AlignmentError, AlignmentResult, AlignmentStage};

/// Blends two camera poses
pub struct CameraPoseInterpolator;

impl CameraPoseInterpolator {
    /// Linear position and spherical orientation blend, `t` in `[0, 1]`
    pub fn interpolate(from: &CameraPose, to: &CameraPose, t: f64) -> CameraPose {
        let position = from.position.lerp(&to.position, t);
        // q and -q are the same rotation; slerp flips the sign to take the short arc
        let orientation = from.orientation.slerp(&to.orientation, t);
        CameraPose { position, orientation }
    }
}

/// Immutable after loading; queried throughout a session
#[derive(Debug, Clone, Default)]
pub struct PoseTimeIndex {
    poses: BTreeMap<FrameNumber, CameraPose>,
}

impl PoseTimeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from reconstruction poses, converted with `convention`
    pub fn from_sfm_poses<I>(poses: I, convention: &CameraConvention) -> Self
    where
        I: IntoIterator<Item = SfmPose>,
    {
        let mut index = Self::new();
        index.extend_sfm_poses(poses, convention);
        index
    }

    /// Add another chunk; returns how many frames were new
    pub fn extend_sfm_poses<I>(&mut self, poses: I, convention: &CameraConvention) -> usize
    where
        I: IntoIterator<Item = SfmPose>,
    {
        poses
            .into_iter()
            .filter(|pose| self.insert(pose.frame, convention.apply(pose)))
            .count()
    }

    /// Insert a pose unless the frame is already known; the first pose wins
    pub fn insert(&mut self, frame: FrameNumber, pose: CameraPose) -> bool {
        if self.poses.contains_key(&frame) {
            trace!("frame {} already posed by an earlier chunk, skipping", frame);
            return false;
        }
        self.poses.insert(frame, pose);
        true
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Known frames in ascending order
    pub fn frames(&self) -> Vec<FrameNumber> {
        self.poses.keys().copied().collect()
    }

    /// First and last known frame
    pub fn range(&self) -> Option<(FrameNumber, FrameNumber)> {
        let first = *self.poses.keys().next()?;
        let last = *self.poses.keys().next_back()?;
        Some((first, last))
    }

    /// Pose stored for exactly `frame`
    pub fn measured(&self, frame: FrameNumber) -> Option<&CameraPose> {
        self.poses.get(&frame)
    }

    /// World position stored for exactly `frame`
    pub fn position(&self, frame: FrameNumber) -> Option<Vector3<f64>> {
        self.poses.get(&frame).map(|p| p.position)
    }

    /// Pose for any frame inside the known range.
    ///
    /// Known frames are returned as measured; frames in a gap are blended
    /// between the nearest known frames on either side.
    pub fn get_pose(&self, frame: FrameNumber) -> AlignmentResult<PoseQuery> {
        let (first, last) = self
            .range()
            .ok_or_else(|| AlignmentError::insufficient(AlignmentStage::PoseIndex, 1, 0))?;

        if let Some(pose) = self.poses.get(&frame) {
            return Ok(PoseQuery {
                frame,
                pose: *pose,
                state: PoseState::Measured,
            });
        }

        let out_of_range = AlignmentError::FrameOutOfRange { frame, first, last };
        let (&from, before) = self.poses.range(..frame).next_back().ok_or(out_of_range)?;
        let (&to, after) = self
            .poses
            .range((Excluded(frame), Unbounded))
            .next()
            .ok_or(AlignmentError::FrameOutOfRange { frame, first, last })?;

        let t = (frame - from) as f64 / (to - from) as f64;
        Ok(PoseQuery {
            frame,
            pose: CameraPoseInterpolator::interpolate(before, after, t),
            state: PoseState::Interpolated,
        })
    }
}
