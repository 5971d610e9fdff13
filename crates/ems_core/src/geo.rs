//! Geographic primitives: lat/lon points and great-circle distance.
//!
//! Everything downstream (fleet selection, hospital triage, recommender features)
//! measures distance through [`haversine_km`] unless a road-network provider is
//! configured in [`crate::routing`].

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default average ambulance speed used for time estimates.
pub const DEFAULT_AVERAGE_SPEED_KMH: f64 = 30.0;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(*self, *other)
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// Axis-aligned lat/lon bounding box (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: GeoPoint) -> bool {
        (self.lat_min..=self.lat_max).contains(&point.lat)
            && (self.lon_min..=self.lon_max).contains(&point.lon)
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.lat_min + self.lat_max) * 0.5,
            (self.lon_min + self.lon_max) * 0.5,
        )
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lon.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lon.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Minutes needed to cover `distance_km` at a constant `speed_kmh`.
pub fn travel_minutes(distance_km: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 {
        return f64::INFINITY;
    }
    distance_km / speed_kmh * 60.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_164: GeoPoint = GeoPoint::new(14.6628689, 121.1214235);
    const BASE_163: GeoPoint = GeoPoint::new(14.6270218, 121.0797032);
    const PATIENT: GeoPoint = GeoPoint::new(14.6380867, 121.1280829);

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(haversine_km(BASE_164, BASE_164), 0.0);
        assert_eq!(haversine_km(PATIENT, PATIENT), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let ab = haversine_km(BASE_164, PATIENT);
        let ba = haversine_km(PATIENT, BASE_164);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn triangle_inequality_holds() {
        let ac = haversine_km(BASE_164, BASE_163);
        let ab = haversine_km(BASE_164, PATIENT);
        let bc = haversine_km(PATIENT, BASE_163);
        assert!(ac <= ab + bc + 1e-9);
    }

    #[test]
    fn known_marikina_distance() {
        // About 2.85 km between the Fortune base and the reference patient.
        let d = haversine_km(BASE_164, PATIENT);
        assert!(d > 2.7 && d < 3.0, "unexpected distance {d}");
    }

    #[test]
    fn travel_minutes_at_thirty_kmh() {
        assert!((travel_minutes(15.0, DEFAULT_AVERAGE_SPEED_KMH) - 30.0).abs() < 1e-12);
        assert!(travel_minutes(1.0, 0.0).is_infinite());
    }

    #[test]
    fn bounding_box_contains_edges() {
        let bbox = BoundingBox {
            lat_min: 14.60,
            lat_max: 14.68,
            lon_min: 121.07,
            lon_max: 121.13,
        };
        assert!(bbox.contains(GeoPoint::new(14.60, 121.13)));
        assert!(!bbox.contains(GeoPoint::new(15.0, 122.0)));
        assert!(bbox.contains(bbox.center()));
    }
}
