#![allow(dead_code)]

use ems_core::geo::GeoPoint;
use ems_core::routing::{RouteLeg, RouteProvider, RoutingError};
use ems_core::simulation::DispatchRecord;

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}

/// Road provider that is always down.
pub struct OfflineProvider;

impl RouteProvider for OfflineProvider {
    fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<RouteLeg, RoutingError> {
        Err(RoutingError::Unavailable("connection refused".to_string()))
    }
}

/// Road provider answering every request with the same leg.
pub struct FixedLegProvider(pub RouteLeg);

impl RouteProvider for FixedLegProvider {
    fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<RouteLeg, RoutingError> {
        Ok(self.0)
    }
}

/// Total response recomputed from its parts in the canonical order.
pub fn summed_breakdown(record: &DispatchRecord) -> f64 {
    let b = &record.breakdown;
    b.dispatch_min + b.to_patient_min + b.on_scene_min + b.to_hospital_min + b.handover_min
}
