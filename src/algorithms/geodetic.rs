//! Displacement between projected positions

use nalgebra::Vector3;

use super::projection::ProjectionRegistry;
use crate::core::GeodeticPosition;
use crate::validation::ProjectionError;

impl GeodeticPosition {
    /// Displacement in meters from `self` to `other` as `(east, altitude, north)`.
    ///
    /// When `other` lives in a different projection it is reprojected into
    /// `self.projection` through geodetic coordinates first.
    pub fn displacement_to(
        &self,
        other: &GeodeticPosition,
        registry: &ProjectionRegistry,
    ) -> Result<Vector3<f64>, ProjectionError> {
        if self.projection.is_empty() {
            return Err(ProjectionError::Unsupported {
                projection: String::new(),
            });
        }

        if self.same_projection(other) {
            return Ok(self.axis_difference(other));
        }

        let other = registry.reproject(other, &self.projection)?;
        Ok(self.axis_difference(&other))
    }

    fn axis_difference(&self, other: &GeodeticPosition) -> Vector3<f64> {
        Vector3::new(
            other.east - self.east,
            other.altitude - self.altitude,
            other.north - self.north,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::projection::{CoordinatesConverter, GeodeticCoordinate, IdentityProjection};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Identity converter that counts inverse projections
    struct CountingConverter {
        inner: IdentityProjection,
        name: String,
        inverse_calls: Arc<AtomicUsize>,
        reject_east_above: f64,
    }

    impl CoordinatesConverter for CountingConverter {
        fn projection(&self) -> &str {
            &self.name
        }

        fn from_geodetic(
            &self,
            longitude: f64,
            latitude: f64,
            elevation: f64,
        ) -> Result<GeodeticPosition, ProjectionError> {
            if longitude > self.reject_east_above {
                return Err(ProjectionError::OutOfDomain {
                    projection: self.name.clone(),
                    longitude,
                    latitude,
                });
            }
            let mut pos = self.inner.from_geodetic(longitude, latitude, elevation)?;
            pos.projection = self.name.clone();
            Ok(pos)
        }

        fn to_geodetic(&self, position: &GeodeticPosition) -> Result<GeodeticCoordinate, ProjectionError> {
            self.inverse_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.to_geodetic(position)
        }
    }

    fn counting_registry() -> (ProjectionRegistry, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ProjectionRegistry::new();
        for name in ["alpha", "beta"] {
            registry.register(Arc::new(CountingConverter {
                inner: IdentityProjection::new(name),
                name: name.to_string(),
                inverse_calls: Arc::clone(&calls),
                reject_east_above: 1000.0,
            }));
        }
        (registry, calls)
    }

    #[test]
    fn test_displacement_axis_order() {
        let registry = ProjectionRegistry::new();
        let a = GeodeticPosition::new("alpha", 100.0, 200.0, 10.0);
        let b = GeodeticPosition::new("alpha", 130.0, 240.0, 15.0);

        let d = a.displacement_to(&b, &registry).unwrap();
        assert_eq!(d, Vector3::new(40.0, 5.0, 30.0));
    }

    #[test]
    fn test_same_projection_needs_no_converter() {
        let (registry, calls) = counting_registry();
        let a = GeodeticPosition::new("alpha", 0.0, 0.0, 0.0);
        let b = GeodeticPosition::new("ALPHA", 1.0, 1.0, 1.0);

        a.displacement_to(&b, &registry).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_differing_projection_reprojects_once() {
        let (registry, calls) = counting_registry();
        let a = GeodeticPosition::new("alpha", 10.0, 20.0, 0.0);
        let b = GeodeticPosition::new("beta", 15.0, 22.0, 3.0);

        let d = a.displacement_to(&b, &registry).unwrap();
        assert_eq!(d, Vector3::new(2.0, 3.0, 5.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejected_reprojection_surfaces_position_and_target() {
        let (registry, _) = counting_registry();
        let a = GeodeticPosition::new("alpha", 0.0, 0.0, 0.0);
        let b = GeodeticPosition::new("beta", 0.0, 5000.0, 0.0);

        match a.displacement_to(&b, &registry) {
            Err(ProjectionError::Reprojection { position, target, cause }) => {
                assert_eq!(position, b);
                assert_eq!(target, "alpha");
                assert!(matches!(*cause, ProjectionError::OutOfDomain { .. }));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_unregistered_projection_fails() {
        let registry = ProjectionRegistry::new();
        let a = GeodeticPosition::new("alpha", 0.0, 0.0, 0.0);
        let b = GeodeticPosition::new("gamma", 0.0, 0.0, 0.0);
        assert!(a.displacement_to(&b, &registry).is_err());
    }
}
