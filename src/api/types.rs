//! Serializable alignment output

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::algorithms::alignment::{Alignment, AlignmentDiagnostics};
use crate::algorithms::similarity::PlacedMarker;
use crate::core::{FrameNumber, GeodeticPosition, PoseQuery, PoseState};

/// Alignment result in the shape written to disk or stdout
#[derive(Debug, Clone, Serialize)]
pub struct AlignmentReport {
    /// Projection the GNSS origin is expressed in
    pub projection: String,
    pub origin_gnss: GeodeticPosition,
    pub origin_sfm: [f64; 3],
    pub scale: f64,
    /// Row-major rotation from GNSS displacement to reconstruction frame
    pub rotation_matrix: [[f64; 3]; 3],
    /// Same rotation as `[x, y, z, w]`
    pub quaternion: [f64; 4],
    pub diagnostics: AlignmentDiagnostics,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub poses: Vec<PoseReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<PlacedMarker>,
}

/// Camera pose of a single frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseReport {
    pub frame: FrameNumber,
    pub position: [f64; 3],
    /// `[x, y, z, w]`
    pub orientation: [f64; 4],
    pub state: PoseState,
}

impl From<&PoseQuery> for PoseReport {
    fn from(query: &PoseQuery) -> Self {
        let p = query.pose.position;
        let q = query.pose.orientation;
        Self {
            frame: query.frame,
            position: [p.x, p.y, p.z],
            orientation: [q.i, q.j, q.k, q.w],
            state: query.state,
        }
    }
}

impl AlignmentReport {
    pub fn from_alignment(alignment: &Alignment) -> Self {
        let t = &alignment.transform;
        let m = t.rotation().matrix();
        let q = t.quaternion();
        let o = t.origin_sfm();

        Self {
            projection: t.origin_gnss().projection.clone(),
            origin_gnss: t.origin_gnss().clone(),
            origin_sfm: [o.x, o.y, o.z],
            scale: t.scale(),
            rotation_matrix: [
                [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
                [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
            ],
            quaternion: [q.i, q.j, q.k, q.w],
            diagnostics: alignment.diagnostics.clone(),
            poses: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn with_poses<'a, I>(mut self, queries: I) -> Self
    where
        I: IntoIterator<Item = &'a PoseQuery>,
    {
        self.poses.extend(queries.into_iter().map(PoseReport::from));
        self
    }

    pub fn with_markers(mut self, markers: Vec<PlacedMarker>) -> Self {
        self.markers = markers;
        self
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

impl fmt::Display for AlignmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "origin frame {}: {}", self.diagnostics.origin_frame, self.origin_gnss)?;
        writeln!(
            f,
            "scale {:.6} from {} of {} correspondences",
            self.scale, self.diagnostics.scale_samples, self.diagnostics.correspondences
        )?;
        write!(
            f,
            "rotation [{:.6}, {:.6}, {:.6}, {:.6}], condition {:.3e}{}",
            self.quaternion[0],
            self.quaternion[1],
            self.quaternion[2],
            self.quaternion[3],
            self.diagnostics.condition_ratio,
            if self.diagnostics.ill_conditioned { " (ill-conditioned)" } else { "" }
        )
    }
}
