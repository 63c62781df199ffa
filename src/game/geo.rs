//! Great-circle distance and coordinate validation

use serde::{Deserialize, Serialize};

use crate::types::StarlightError;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Meters spanned by one degree of latitude
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Haversine distance in meters between two coordinates given in degrees
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` a hair outside [0, 1] for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// A validated WGS84 position
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl GeoPoint {
    /// Build a point, rejecting non-finite or out-of-range coordinates
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, StarlightError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(StarlightError::Validation(
                "latitude must be between -90 and 90".into(),
            ));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(StarlightError::Validation(
                "longitude must be between -180 and 180".into(),
            ));
        }
        Ok(Self {
            latitude,
            longitude,
            altitude: None,
        })
    }

    /// Build a point from optional request fields
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Result<Self, StarlightError> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => Self::new(lat, lon),
            _ => Err(StarlightError::Validation(
                "latitude and longitude are required".into(),
            )),
        }
    }

    pub fn with_altitude(mut self, altitude: Option<f64>) -> Self {
        self.altitude = altitude.filter(|a| a.is_finite());
        self
    }

    /// Haversine distance to another point, in meters
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        distance_meters(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Lat/lon window enclosing a circle, used to pre-filter storage queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        let lat_ok = point.latitude >= self.min_lat && point.latitude <= self.max_lat;
        let lon_ok = if self.min_lon <= self.max_lon {
            point.longitude >= self.min_lon && point.longitude <= self.max_lon
        } else {
            // Window crosses the antimeridian
            point.longitude >= self.min_lon || point.longitude <= self.max_lon
        };
        lat_ok && lon_ok
    }
}

/// Compute a conservative bounding box around `center` for `radius_meters`.
///
/// Near the poles the longitude span covers the full circle.
pub fn bounding_box(center: &GeoPoint, radius_meters: f64) -> BoundingBox {
    let lat_delta = radius_meters / METERS_PER_DEGREE_LAT;
    let min_lat = (center.latitude - lat_delta).max(-90.0);
    let max_lat = (center.latitude + lat_delta).min(90.0);

    let cos_lat = center.latitude.to_radians().cos();
    let lon_delta = if cos_lat < 1e-6 {
        180.0
    } else {
        radius_meters / (METERS_PER_DEGREE_LAT * cos_lat)
    };

    if lon_delta >= 180.0 || max_lat >= 90.0 || min_lat <= -90.0 {
        return BoundingBox {
            min_lat,
            max_lat,
            min_lon: -180.0,
            max_lon: 180.0,
        };
    }

    let wrap = |lon: f64| {
        if lon > 180.0 {
            lon - 360.0
        } else if lon < -180.0 {
            lon + 360.0
        } else {
            lon
        }
    };

    BoundingBox {
        min_lat,
        max_lat,
        min_lon: wrap(center.longitude - lon_delta),
        max_lon: wrap(center.longitude + lon_delta),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_zero() {
        assert_eq!(distance_meters(40.7589, -73.9851, 40.7589, -73.9851), 0.0);
        assert_eq!(distance_meters(-89.9, 179.9, -89.9, 179.9), 0.0);
    }

    #[test]
    fn test_distance_symmetry() {
        let pairs = [
            ((40.7589, -73.9851), (37.8199, -122.4783)),
            ((0.0, 0.0), (0.0, 179.99)),
            ((-33.8568, 151.2153), (51.5007, -0.1246)),
            ((89.0, 10.0), (-89.0, -170.0)),
        ];
        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let ab = distance_meters(lat1, lon1, lat2, lon2);
            let ba = distance_meters(lat2, lon2, lat1, lon1);
            assert!((ab - ba).abs() < 1e-6, "{} != {}", ab, ba);
            assert!(ab >= 0.0);
        }
    }

    #[test]
    fn test_fifty_meter_fixture() {
        let d = distance_meters(40.7589, -73.9851, 40.7589 + 0.00045, -73.9851);
        assert!((d - 50.0).abs() <= 1.0, "distance was {}", d);
    }

    #[test]
    fn test_golden_gate_scenario_distance() {
        let d = distance_meters(37.8199, -122.4783, 37.8300, -122.4900);
        assert!(d > 1400.0 && d < 1700.0, "distance was {}", d);
    }

    #[test]
    fn test_antipodal_is_finite() {
        let d = distance_meters(0.0, 0.0, 0.0, 180.0);
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);
    }

    #[test]
    fn test_geopoint_validation() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
        assert!(GeoPoint::new(90.1, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(0.0, f64::INFINITY).is_err());
        assert!(GeoPoint::from_parts(Some(1.0), None).is_err());
    }

    #[test]
    fn test_bounding_box_contains_circle() {
        let center = GeoPoint::new(37.8199, -122.4783).unwrap();
        let bbox = bounding_box(&center, 1000.0);

        // Points ~900m north and east are inside the window
        let north = GeoPoint::new(37.8199 + 0.0081, -122.4783).unwrap();
        let east = GeoPoint::new(37.8199, -122.4783 + 0.0102).unwrap();
        assert!(bbox.contains(&north));
        assert!(bbox.contains(&east));

        let far = GeoPoint::new(37.9, -122.4783).unwrap();
        assert!(!bbox.contains(&far));
    }

    #[test]
    fn test_bounding_box_antimeridian() {
        let center = GeoPoint::new(0.0, 179.999).unwrap();
        let bbox = bounding_box(&center, 1000.0);
        assert!(bbox.min_lon > bbox.max_lon);

        let across = GeoPoint::new(0.0, -179.999).unwrap();
        assert!(bbox.contains(&across));
    }
}
