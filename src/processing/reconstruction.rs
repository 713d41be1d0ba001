//! AliceVision `.sfm` reconstruction loader

use log::debug;
use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};
use serde::Deserialize;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

use crate::algorithms::rotation::rotation_to_quaternion;
use crate::core::{CameraPose, FrameNumber, SfmPose};
use crate::utils::config::CameraConvention;
use crate::validation::{AlignmentError, AlignmentResult};

/// JSON scalar AliceVision writes either quoted or bare
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

impl Scalar {
    fn as_key(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            Scalar::Number(n) => n.to_string(),
        }
    }

    fn as_f32(&self) -> Option<f32> {
        match self {
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Number(n) => n.as_f64().map(|v| v as f32),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SfmFile {
    #[serde(default)]
    views: Vec<ViewDesc>,
    #[serde(default)]
    poses: Vec<PoseDesc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewDesc {
    pose_id: Scalar,
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoseDesc {
    pose_id: Scalar,
    pose: PoseBody,
}

#[derive(Debug, Deserialize)]
struct PoseBody {
    transform: TransformDesc,
}

#[derive(Debug, Deserialize)]
struct TransformDesc {
    center: Vec<Scalar>,
    rotation: Vec<Scalar>,
}

fn malformed(path: &str, reason: impl Into<String>) -> AlignmentError {
    AlignmentError::MalformedReconstruction {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn floats<const N: usize>(values: &[Scalar], source: &str, what: &str) -> AlignmentResult<[f32; N]> {
    if values.len() != N {
        return Err(malformed(source, format!("{} has {} values, expected {}", what, values.len(), N)));
    }
    let mut out = [0.0f32; N];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = value
            .as_f32()
            .ok_or_else(|| malformed(source, format!("{} contains a non-numeric value {:?}", what, value)))?;
        if !slot.is_finite() {
            return Err(malformed(source, format!("{} contains a non-finite value {:?}", what, value)));
        }
    }
    Ok(out)
}

/// Frame number encoded in a view path, e.g. `frames/000123.jpg` -> 123
pub fn frame_from_path(path: &str) -> Option<FrameNumber> {
    Path::new(path).file_stem()?.to_str()?.parse().ok()
}

/// Parse the contents of an `.sfm` file; `source` names it in errors
pub fn parse_reconstruction(json: &str, source: &str) -> AlignmentResult<Vec<SfmPose>> {
    let sfm: SfmFile = serde_json::from_str(json).map_err(|e| malformed(source, e.to_string()))?;

    let transforms: HashMap<String, &TransformDesc> = sfm
        .poses
        .iter()
        .map(|p| (p.pose_id.as_key(), &p.pose.transform))
        .collect();

    let mut poses = Vec::with_capacity(sfm.views.len());
    for view in &sfm.views {
        let frame = frame_from_path(&view.path)
            .ok_or_else(|| malformed(source, format!("view '{}' is not named by a frame number", view.path)))?;

        let Some(transform) = transforms.get(&view.pose_id.as_key()) else {
            debug!("no pose for view {} ({}), skipping", frame, view.pose_id.as_key());
            continue;
        };

        let center = floats::<3>(&transform.center, source, "center")?;
        let rotation = floats::<9>(&transform.rotation, source, "rotation")?;

        poses.push(SfmPose {
            frame,
            center: Vector3::from(center),
            rotation: Matrix3::from_row_slice(&rotation),
        });
    }

    debug!("{}: {} posed views", source, poses.len());
    Ok(poses)
}

/// Load one reconstruction chunk file
pub fn load_reconstruction<P: AsRef<Path>>(path: P) -> AlignmentResult<Vec<SfmPose>> {
    let source = path.as_ref().to_string_lossy().to_string();
    let json = fs::read_to_string(&path).map_err(|e| AlignmentError::Io {
        path: source.clone(),
        source: e,
    })?;
    parse_reconstruction(&json, &source)
}

impl CameraConvention {
    /// Convert a reconstruction pose into the renderer frame
    pub fn apply(&self, pose: &SfmPose) -> CameraPose {
        let center = pose.center.cast::<f64>();
        let mut orientation = rotation_to_quaternion(&pose.rotation.cast::<f64>());
        let mut position = center;

        if self.mirror_x {
            position.x = -position.x;
            let q = *orientation.quaternion();
            orientation = UnitQuaternion::new_unchecked(Quaternion::new(-q.w, -q.i, q.j, q.k));
        }

        if self.roll_180 {
            orientation *= UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI);
        }

        CameraPose { position, orientation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    const SFM: &str = r#"{
        "version": ["1", "0", "0"],
        "views": [
            { "viewId": "11", "poseId": "11", "path": "/tmp/frames/000010.jpg" },
            { "viewId": "12", "poseId": 12, "path": "/tmp/frames/000012.jpg" },
            { "viewId": "13", "poseId": "13", "path": "/tmp/frames/000014.jpg" }
        ],
        "poses": [
            { "poseId": "11", "pose": { "transform": {
                "center": ["1.5", "-2.0", "0.25"],
                "rotation": ["1", "0", "0", "0", "1", "0", "0", "0", "1"] } } },
            { "poseId": "12", "pose": { "transform": {
                "center": [3.0, 0.0, 1.0],
                "rotation": [0, -1, 0, 1, 0, 0, 0, 0, 1] } } }
        ]
    }"#;

    #[test]
    fn test_parse_views_and_poses() {
        let poses = parse_reconstruction(SFM, "chunk1.sfm").unwrap();

        assert_eq!(poses.len(), 2);
        assert_eq!(poses[0].frame, 10);
        assert_eq!(poses[0].center, Vector3::new(1.5, -2.0, 0.25));
        assert_eq!(poses[1].frame, 12);
        // row-major
        assert_eq!(poses[1].rotation[(0, 1)], -1.0);
        assert_eq!(poses[1].rotation[(1, 0)], 1.0);
    }

    #[test]
    fn test_view_with_non_numeric_name_is_rejected() {
        let json = r#"{ "views": [ { "poseId": "1", "path": "frames/cover.jpg" } ], "poses": [] }"#;
        let err = parse_reconstruction(json, "chunk.sfm").unwrap_err();
        assert!(matches!(err, AlignmentError::MalformedReconstruction { .. }));
    }

    #[test]
    fn test_short_rotation_is_rejected() {
        let json = r#"{ "views": [ { "poseId": "1", "path": "7.jpg" } ],
            "poses": [ { "poseId": "1", "pose": { "transform": { "center": [0, 0, 0], "rotation": [1, 0, 0] } } } ] }"#;
        let err = parse_reconstruction(json, "chunk.sfm").unwrap_err();
        assert!(err.to_string().contains("rotation has 3 values"));
    }

    #[test]
    fn test_non_finite_center_is_rejected() {
        let json = r#"{ "views": [ { "poseId": "1", "path": "7.jpg" } ],
            "poses": [ { "poseId": "1", "pose": { "transform": { "center": ["nan", "inf", "0"],
                "rotation": [1, 0, 0, 0, 1, 0, 0, 0, 1] } } } ] }"#;
        let err = parse_reconstruction(json, "chunk.sfm").unwrap_err();
        assert!(matches!(err, AlignmentError::MalformedReconstruction { .. }));
        assert!(err.to_string().contains("center contains a non-finite value"));
    }

    #[test]
    fn test_value_beyond_f32_range_is_rejected() {
        let json = r#"{ "views": [ { "poseId": "1", "path": "7.jpg" } ],
            "poses": [ { "poseId": "1", "pose": { "transform": { "center": [0, 0, 0],
                "rotation": [1e39, 0, 0, 0, 1, 0, 0, 0, 1] } } } ] }"#;
        let err = parse_reconstruction(json, "chunk.sfm").unwrap_err();
        assert!(err.to_string().contains("rotation contains a non-finite value"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_reconstruction(dir.path().join("missing.sfm")).unwrap_err();
        assert!(matches!(err, AlignmentError::Io { .. }));
    }

    #[test]
    fn test_identity_convention_keeps_pose() {
        let pose = SfmPose {
            frame: 1,
            center: Vector3::new(1.0, 2.0, 3.0),
            rotation: Matrix3::identity(),
        };
        let cam = CameraConvention::identity().apply(&pose);
        assert_eq!(cam.position, Vector3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(cam.orientation.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_default_convention_mirrors_and_rolls() {
        let pose = SfmPose {
            frame: 1,
            center: Vector3::new(1.0, 2.0, 3.0),
            rotation: Matrix3::identity(),
        };
        let cam = CameraConvention::default().apply(&pose);

        assert_eq!(cam.position, Vector3::new(-1.0, 2.0, 3.0));
        // identity mirrored stays identity, then rolled half a turn about Z
        let expected = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI);
        assert_relative_eq!(cam.orientation.angle_to(&expected), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mirror_conjugates_rotation_by_reflection() {
        let q0 = UnitQuaternion::from_euler_angles(0.4, 0.1, -0.6);
        let r = q0.to_rotation_matrix().into_inner();
        let pose = SfmPose {
            frame: 1,
            center: Vector3::zeros(),
            rotation: r.cast::<f32>(),
        };
        let convention = CameraConvention {
            mirror_x: true,
            roll_180: false,
        };
        let cam = convention.apply(&pose);

        let s = Matrix3::from_diagonal(&Vector3::new(-1.0, 1.0, 1.0));
        let expected = s * r * s;
        assert_relative_eq!(cam.orientation.to_rotation_matrix().into_inner(), expected, epsilon = 1e-6);
    }
}
