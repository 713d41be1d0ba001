//! Scale, rotation and translation from projected GNSS space into the
//! reconstruction frame

use nalgebra::{Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::projection::ProjectionRegistry;
use super::rotation::rotation_to_quaternion;
use crate::core::{GeodeticPosition, Marker};
use crate::validation::ProjectionError;

/// Immutable once computed; a new alignment produces a new transform
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityTransform {
    origin_sfm: Vector3<f64>,
    origin_gnss: GeodeticPosition,
    scale: f64,
    rotation: Rotation3<f64>,
}

/// Marker placed in the world frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedMarker {
    pub name: String,
    pub world: Vector3<f64>,
}

/// Parent frame for GNSS-space objects: children sit at
/// `origin_gnss.displacement_to(pos)` in its local coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub scale: f64,
}

impl Anchor {
    /// World position of a point given in anchor-local coordinates
    pub fn to_world(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.position + self.rotation * (local * self.scale)
    }
}

impl SimilarityTransform {
    pub fn new(origin_sfm: Vector3<f64>, origin_gnss: GeodeticPosition, scale: f64, rotation: Rotation3<f64>) -> Self {
        Self {
            origin_sfm,
            origin_gnss,
            scale,
            rotation,
        }
    }

    pub fn origin_sfm(&self) -> &Vector3<f64> {
        &self.origin_sfm
    }

    pub fn origin_gnss(&self) -> &GeodeticPosition {
        &self.origin_gnss
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn rotation(&self) -> &Rotation3<f64> {
        &self.rotation
    }

    /// Rotation in the forward/up quaternion form renderers consume
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        rotation_to_quaternion(self.rotation.matrix())
    }

    /// Displacement of `position` from the GNSS origin, in anchor-local coordinates
    pub fn local_position(
        &self,
        position: &GeodeticPosition,
        registry: &ProjectionRegistry,
    ) -> Result<Vector3<f64>, ProjectionError> {
        self.origin_gnss.displacement_to(position, registry)
    }

    /// `origin_sfm + R · (scale · origin_gnss.displacement_to(position))`
    pub fn to_world(
        &self,
        position: &GeodeticPosition,
        registry: &ProjectionRegistry,
    ) -> Result<Vector3<f64>, ProjectionError> {
        let local = self.local_position(position, registry)?;
        Ok(self.origin_sfm + self.rotation * (local * self.scale))
    }

    /// Map named markers into the world frame; fails on the first marker
    /// that cannot be projected
    pub fn place_markers(
        &self,
        markers: &[Marker],
        registry: &ProjectionRegistry,
    ) -> Result<Vec<PlacedMarker>, ProjectionError> {
        markers
            .iter()
            .map(|marker| {
                Ok(PlacedMarker {
                    name: marker.name.clone(),
                    world: self.to_world(&marker.position, registry)?,
                })
            })
            .collect()
    }

    pub fn anchor(&self) -> Anchor {
        Anchor {
            position: self.origin_sfm,
            rotation: self.quaternion(),
            scale: self.scale,
        }
    }
}
