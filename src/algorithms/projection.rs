//! Geodetic projection boundary
//!
//! Converters map geodetic longitude/latitude/elevation onto a named planar
//! projection and back. The [`ProjectionRegistry`] is built once at start-up
//! and passed to every call site that needs to project or reproject a
//! position.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::GeodeticPosition;
use crate::validation::ProjectionError;

/// Name reported for the geodetic side of a failed inverse projection
const GEODETIC_TARGET: &str = "WGS84";

/// Geodetic coordinate in decimal degrees and meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticCoordinate {
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: f64,
}

/// Conversion between geodetic coordinates and one planar projection
pub trait CoordinatesConverter: Send + Sync {
    /// Name of the projection this converter produces
    fn projection(&self) -> &str;

    /// Project a geodetic coordinate into this projection
    fn from_geodetic(
        &self,
        longitude: f64,
        latitude: f64,
        elevation: f64,
    ) -> Result<GeodeticPosition, ProjectionError>;

    /// Inverse projection back to geodetic coordinates
    fn to_geodetic(&self, position: &GeodeticPosition) -> Result<GeodeticCoordinate, ProjectionError>;
}

/// Reference ellipsoid parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    /// Semi-major axis in meters
    pub semi_major_axis: f64,
    /// Flattening factor
    pub flattening: f64,
}

impl Ellipsoid {
    /// GRS80, the ellipsoid of SWEREF 99
    pub fn grs80() -> Self {
        Self {
            semi_major_axis: 6378137.0,
            flattening: 1.0 / 298.257222101,
        }
    }

    /// First eccentricity squared
    pub fn eccentricity_squared(&self) -> f64 {
        self.flattening * (2.0 - self.flattening)
    }
}

/// Geodetic bounding box where a projection is defined
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaOfUse {
    pub min_longitude: f64,
    pub max_longitude: f64,
    pub min_latitude: f64,
    pub max_latitude: f64,
}

impl AreaOfUse {
    /// Area of use of the SWEREF 99 projections (EPSG:3006)
    pub fn sweden() -> Self {
        Self {
            min_longitude: 10.03,
            max_longitude: 24.17,
            min_latitude: 54.96,
            max_latitude: 69.07,
        }
    }

    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        longitude >= self.min_longitude
            && longitude <= self.max_longitude
            && latitude >= self.min_latitude
            && latitude <= self.max_latitude
    }
}

/// Series coefficients of the Gauss-Krüger formulas, fixed per ellipsoid
#[derive(Debug, Clone, Copy)]
struct SeriesCoefficients {
    a_roof: f64,
    // forward: geodetic latitude -> conformal latitude
    conformal: [f64; 4],
    beta: [f64; 4],
    // inverse: conformal latitude -> geodetic latitude
    geodetic: [f64; 4],
    delta: [f64; 4],
}

impl SeriesCoefficients {
    fn new(ellipsoid: &Ellipsoid) -> Self {
        let f = ellipsoid.flattening;
        let e2 = ellipsoid.eccentricity_squared();
        let n = f / (2.0 - f);
        let a_roof = ellipsoid.semi_major_axis / (1.0 + n) * (1.0 + n.powi(2) / 4.0 + n.powi(4) / 64.0);

        let conformal = [
            e2,
            (5.0 * e2.powi(2) - e2.powi(3)) / 6.0,
            (104.0 * e2.powi(3) - 45.0 * e2.powi(4)) / 120.0,
            1237.0 * e2.powi(4) / 1260.0,
        ];
        let beta = [
            n / 2.0 - 2.0 * n.powi(2) / 3.0 + 5.0 * n.powi(3) / 16.0 + 41.0 * n.powi(4) / 180.0,
            13.0 * n.powi(2) / 48.0 - 3.0 * n.powi(3) / 5.0 + 557.0 * n.powi(4) / 1440.0,
            61.0 * n.powi(3) / 240.0 - 103.0 * n.powi(4) / 140.0,
            49561.0 * n.powi(4) / 161280.0,
        ];
        let geodetic = [
            e2 + e2.powi(2) + e2.powi(3) + e2.powi(4),
            -(7.0 * e2.powi(2) + 17.0 * e2.powi(3) + 30.0 * e2.powi(4)) / 6.0,
            (224.0 * e2.powi(3) + 889.0 * e2.powi(4)) / 120.0,
            -(4279.0 * e2.powi(4)) / 1260.0,
        ];
        let delta = [
            n / 2.0 - 2.0 * n.powi(2) / 3.0 + 37.0 * n.powi(3) / 96.0 - n.powi(4) / 360.0,
            n.powi(2) / 48.0 + n.powi(3) / 15.0 - 437.0 * n.powi(4) / 1440.0,
            17.0 * n.powi(3) / 480.0 - 37.0 * n.powi(4) / 840.0,
            4397.0 * n.powi(4) / 161280.0,
        ];

        Self {
            a_roof,
            conformal,
            beta,
            geodetic,
            delta,
        }
    }
}

/// Transverse Mercator projection evaluated with the Gauss-Krüger series
#[derive(Debug, Clone)]
pub struct TransverseMercator {
    name: String,
    central_meridian_deg: f64,
    scale_factor: f64,
    false_northing: f64,
    false_easting: f64,
    area: AreaOfUse,
    series: SeriesCoefficients,
}

impl TransverseMercator {
    pub fn new(
        name: impl Into<String>,
        ellipsoid: Ellipsoid,
        central_meridian_deg: f64,
        scale_factor: f64,
        false_easting: f64,
        area: AreaOfUse,
    ) -> Self {
        Self {
            name: name.into(),
            central_meridian_deg,
            scale_factor,
            false_northing: 0.0,
            false_easting,
            area,
            series: SeriesCoefficients::new(&ellipsoid),
        }
    }

    /// SWEREF 99 TM (UTM zone 33 on GRS80)
    pub fn sweref_99_tm() -> Self {
        Self::new("sweref_99_tm", Ellipsoid::grs80(), 15.0, 0.9996, 500000.0, AreaOfUse::sweden())
    }

    /// One of the local SWEREF 99 zones, e.g. `sweref_99_13_30` for 13°30'
    pub fn sweref_99_local(degrees: u32, minutes: u32) -> Self {
        let name = format!("sweref_99_{:02}_{:02}", degrees, minutes);
        let meridian = degrees as f64 + minutes as f64 / 60.0;
        Self::new(name, Ellipsoid::grs80(), meridian, 1.0, 150000.0, AreaOfUse::sweden())
    }

    pub fn central_meridian(&self) -> f64 {
        self.central_meridian_deg
    }
}

impl CoordinatesConverter for TransverseMercator {
    fn projection(&self) -> &str {
        &self.name
    }

    fn from_geodetic(
        &self,
        longitude: f64,
        latitude: f64,
        elevation: f64,
    ) -> Result<GeodeticPosition, ProjectionError> {
        if !longitude.is_finite() || !latitude.is_finite() || !self.area.contains(longitude, latitude) {
            return Err(ProjectionError::OutOfDomain {
                projection: self.name.clone(),
                longitude,
                latitude,
            });
        }

        let s = &self.series;
        let phi = latitude.to_radians();
        let delta_lambda = (longitude - self.central_meridian_deg).to_radians();

        let (sin_phi, cos_phi) = phi.sin_cos();
        let sin2 = sin_phi.powi(2);
        let [a, b, c, d] = s.conformal;
        let phi_star = phi - sin_phi * cos_phi * (a + b * sin2 + c * sin2.powi(2) + d * sin2.powi(3));

        let xi = (phi_star.tan() / delta_lambda.cos()).atan();
        let eta = (phi_star.cos() * delta_lambda.sin()).atanh();

        let mut north_sum = xi;
        let mut east_sum = eta;
        for (k, beta) in s.beta.iter().enumerate() {
            let m = 2.0 * (k + 1) as f64;
            north_sum += beta * (m * xi).sin() * (m * eta).cosh();
            east_sum += beta * (m * xi).cos() * (m * eta).sinh();
        }

        let north = self.scale_factor * s.a_roof * north_sum + self.false_northing;
        let east = self.scale_factor * s.a_roof * east_sum + self.false_easting;

        if !north.is_finite() || !east.is_finite() {
            return Err(ProjectionError::OutOfDomain {
                projection: self.name.clone(),
                longitude,
                latitude,
            });
        }

        Ok(GeodeticPosition::new(self.name.clone(), north, east, elevation))
    }

    fn to_geodetic(&self, position: &GeodeticPosition) -> Result<GeodeticCoordinate, ProjectionError> {
        let s = &self.series;
        let xi = (position.north - self.false_northing) / (self.scale_factor * s.a_roof);
        let eta = (position.east - self.false_easting) / (self.scale_factor * s.a_roof);

        let mut xi_prim = xi;
        let mut eta_prim = eta;
        for (k, delta) in s.delta.iter().enumerate() {
            let m = 2.0 * (k + 1) as f64;
            xi_prim -= delta * (m * xi).sin() * (m * eta).cosh();
            eta_prim -= delta * (m * xi).cos() * (m * eta).sinh();
        }

        let phi_star = (xi_prim.sin() / eta_prim.cosh()).asin();
        let delta_lambda = (eta_prim.sinh() / xi_prim.cos()).atan();

        let (sin_phi, cos_phi) = phi_star.sin_cos();
        let sin2 = sin_phi.powi(2);
        let [a, b, c, d] = s.geodetic;
        let phi = phi_star + sin_phi * cos_phi * (a + b * sin2 + c * sin2.powi(2) + d * sin2.powi(3));

        let longitude = self.central_meridian_deg + delta_lambda.to_degrees();
        let latitude = phi.to_degrees();

        if !longitude.is_finite() || !latitude.is_finite() || !position.altitude.is_finite() {
            return Err(ProjectionError::Untransformable {
                position: position.clone(),
                target: GEODETIC_TARGET.to_string(),
            });
        }

        Ok(GeodeticCoordinate {
            longitude,
            latitude,
            elevation: position.altitude,
        })
    }
}

/// Pass-through "projection" for inputs already in a local frame.
///
/// Latitude becomes north, longitude becomes east and elevation becomes
/// altitude, so no projection round trip takes place.
#[derive(Debug, Clone)]
pub struct IdentityProjection {
    name: String,
}

impl IdentityProjection {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl CoordinatesConverter for IdentityProjection {
    fn projection(&self) -> &str {
        &self.name
    }

    fn from_geodetic(
        &self,
        longitude: f64,
        latitude: f64,
        elevation: f64,
    ) -> Result<GeodeticPosition, ProjectionError> {
        Ok(GeodeticPosition::new(self.name.clone(), latitude, longitude, elevation))
    }

    fn to_geodetic(&self, position: &GeodeticPosition) -> Result<GeodeticCoordinate, ProjectionError> {
        Ok(GeodeticCoordinate {
            longitude: position.east,
            latitude: position.north,
            elevation: position.altitude,
        })
    }
}

/// Converters keyed by projection name (case-insensitive)
#[derive(Clone, Default)]
pub struct ProjectionRegistry {
    converters: HashMap<String, Arc<dyn CoordinatesConverter>>,
}

impl fmt::Debug for ProjectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionRegistry")
            .field("projections", &self.projections())
            .finish()
    }
}

impl ProjectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding SWEREF 99 TM and all local SWEREF 99 zones
    pub fn with_sweref_zones() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TransverseMercator::sweref_99_tm()));
        for (degrees, minutes) in [
            (12, 0),
            (13, 30),
            (14, 15),
            (15, 0),
            (15, 45),
            (16, 30),
            (17, 15),
            (18, 0),
            (18, 45),
            (20, 15),
            (21, 45),
            (23, 15),
        ] {
            registry.register(Arc::new(TransverseMercator::sweref_99_local(degrees, minutes)));
        }
        registry
    }

    /// Add or replace the converter for its projection
    pub fn register(&mut self, converter: Arc<dyn CoordinatesConverter>) {
        let key = converter.projection().to_ascii_lowercase();
        self.converters.insert(key, converter);
    }

    pub fn contains(&self, projection: &str) -> bool {
        self.converters.contains_key(&projection.to_ascii_lowercase())
    }

    /// Registered projection names, sorted
    pub fn projections(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .converters
            .values()
            .map(|c| c.projection().to_string())
            .collect();
        names.sort();
        names
    }

    /// Look up the converter for a projection
    pub fn converter(&self, projection: &str) -> Result<&Arc<dyn CoordinatesConverter>, ProjectionError> {
        self.converters
            .get(&projection.to_ascii_lowercase())
            .ok_or_else(|| ProjectionError::Unsupported {
                projection: projection.to_string(),
            })
    }

    /// Project geodetic longitude/latitude/elevation into `projection`
    pub fn project_from_geodetic(
        &self,
        projection: &str,
        longitude: f64,
        latitude: f64,
        elevation: f64,
    ) -> Result<GeodeticPosition, ProjectionError> {
        self.converter(projection)?
            .from_geodetic(longitude, latitude, elevation)
    }

    /// Inverse-project a position into geodetic coordinates
    pub fn project_to_geodetic(&self, position: &GeodeticPosition) -> Result<GeodeticCoordinate, ProjectionError> {
        self.converter(&position.projection)?.to_geodetic(position)
    }

    /// Express `position` in `target` by a round trip through geodetic coordinates.
    ///
    /// Positions already in `target` are returned unchanged without touching
    /// any converter.
    pub fn reproject(&self, position: &GeodeticPosition, target: &str) -> Result<GeodeticPosition, ProjectionError> {
        if position.projection.eq_ignore_ascii_case(target) {
            return Ok(position.clone());
        }

        let wrap = |cause: ProjectionError| ProjectionError::Reprojection {
            position: position.clone(),
            target: target.to_string(),
            cause: Box::new(cause),
        };

        let geodetic = self.project_to_geodetic(position).map_err(wrap)?;
        self.project_from_geodetic(target, geodetic.longitude, geodetic.latitude, geodetic.elevation)
            .map_err(wrap)
    }
}

/// Convert a HAPI style projection string to the internal name.
///
/// `"TM"` becomes `"sweref_99_tm"` and `"13 30"` becomes `"sweref_99_13_30"`.
pub fn hapi_to_internal(hapi: &str) -> String {
    let hapi = hapi.trim();
    if hapi.to_ascii_uppercase().ends_with("TM") {
        return "sweref_99_tm".to_string();
    }
    format!("sweref_99_{}", hapi.replace(' ', "_"))
}

/// Convert an internal SWEREF projection name to the HAPI style
pub fn internal_to_hapi(internal: &str) -> String {
    if internal.ends_with("tm") {
        return "TM".to_string();
    }
    internal
        .strip_prefix("sweref_99_")
        .unwrap_or(internal)
        .replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweref_local_zone_matches_survey_point() {
        let registry = ProjectionRegistry::with_sweref_zones();
        let pos = registry
            .project_from_geodetic("sweref_99_13_30", 13.21404847, 55.71092960, 103.6)
            .unwrap();

        assert_eq!(pos.projection, "sweref_99_13_30");
        assert!((pos.north - 6176415.20).abs() < 0.05);
        assert!((pos.east - 132025.78).abs() < 0.05);
        assert_eq!(pos.altitude, 103.6);
    }

    #[test]
    fn test_sweref_tm_central_meridian() {
        let tm = TransverseMercator::sweref_99_tm();
        let pos = tm.from_geodetic(15.0, 59.3, 10.0).unwrap();
        assert!((pos.east - 500000.0).abs() < 1e-6);
        assert!(pos.north > 6_500_000.0 && pos.north < 6_600_000.0);
    }

    #[test]
    fn test_transverse_mercator_round_trip() {
        let tm = TransverseMercator::sweref_99_local(13, 30);
        let pos = tm.from_geodetic(13.21285566, 55.71090721, 102.3).unwrap();
        let back = tm.to_geodetic(&pos).unwrap();

        assert!((back.longitude - 13.21285566).abs() < 1e-9);
        assert!((back.latitude - 55.71090721).abs() < 1e-9);
        assert_eq!(back.elevation, 102.3);
    }

    #[test]
    fn test_outside_area_of_use_is_rejected() {
        let registry = ProjectionRegistry::with_sweref_zones();
        // Paris
        let result = registry.project_from_geodetic("sweref_99_tm", 2.35, 48.85, 35.0);
        assert!(matches!(result, Err(ProjectionError::OutOfDomain { .. })));
    }

    #[test]
    fn test_unknown_projection_is_unsupported() {
        let registry = ProjectionRegistry::with_sweref_zones();
        let result = registry.project_from_geodetic("rt90_2.5_gon_v", 15.0, 59.0, 0.0);
        assert_eq!(
            result,
            Err(ProjectionError::Unsupported {
                projection: "rt90_2.5_gon_v".to_string()
            })
        );
    }

    #[test]
    fn test_registry_lookup_ignores_case() {
        let registry = ProjectionRegistry::with_sweref_zones();
        assert!(registry.contains("SWEREF_99_13_30"));
        assert_eq!(registry.projections().len(), 13);
    }

    #[test]
    fn test_reproject_between_zones() {
        let registry = ProjectionRegistry::with_sweref_zones();
        let local = registry
            .project_from_geodetic("sweref_99_13_30", 13.21404847, 55.71092960, 103.6)
            .unwrap();
        let tm = registry.reproject(&local, "sweref_99_tm").unwrap();
        let direct = registry
            .project_from_geodetic("sweref_99_tm", 13.21404847, 55.71092960, 103.6)
            .unwrap();

        assert_eq!(tm.projection, "sweref_99_tm");
        assert!((tm.north - direct.north).abs() < 1e-3);
        assert!((tm.east - direct.east).abs() < 1e-3);
    }

    #[test]
    fn test_reproject_wraps_failure() {
        let registry = ProjectionRegistry::with_sweref_zones();
        let far_away = GeodeticPosition::new("sweref_99_13_30", 6176415.0, 900000.0, 0.0);
        let err = registry.reproject(&far_away, "sweref_99_tm").unwrap_err();
        match err {
            ProjectionError::Reprojection { position, target, .. } => {
                assert_eq!(position, far_away);
                assert_eq!(target, "sweref_99_tm");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_identity_projection_swaps_axes() {
        let identity = IdentityProjection::new("local");
        let pos = identity.from_geodetic(10.0, 20.0, 30.0).unwrap();
        assert_eq!(pos, GeodeticPosition::new("local", 20.0, 10.0, 30.0));
        let back = identity.to_geodetic(&pos).unwrap();
        assert_eq!((back.longitude, back.latitude, back.elevation), (10.0, 20.0, 30.0));
    }

    #[test]
    fn test_hapi_projection_names() {
        assert_eq!(hapi_to_internal("TM"), "sweref_99_tm");
        assert_eq!(hapi_to_internal("13 30"), "sweref_99_13_30");
        assert_eq!(internal_to_hapi("sweref_99_tm"), "TM");
        assert_eq!(internal_to_hapi("sweref_99_18_45"), "18 45");
    }
}
