//! Test helpers for common fixtures: bases, hospitals and incidents around Marikina.

use crate::clock::SimTime;
use crate::fleet::{EmsBase, FleetState};
use crate::geo::GeoPoint;
use crate::hospital::{Hospital, HospitalId};
use crate::incident::{Condition, Incident, Severity};
use crate::routing::GeoDistance;
use crate::scenario::{default_bases, default_hospitals};
use crate::simulation::DispatchSimulator;

/// Central Marikina, inside the default bounding box.
pub const TEST_LOCATION: GeoPoint = GeoPoint::new(14.6425, 121.1008);

pub fn test_base(base_id: u32, location: GeoPoint, ambulances: u32) -> EmsBase {
    EmsBase {
        base_id,
        base_name: format!("Test Base {base_id}"),
        location,
        ambulances,
    }
}

pub fn test_hospital(id: HospitalId, level: u8, location: GeoPoint) -> Hospital {
    Hospital {
        id,
        name: format!("Test Hospital {id}"),
        address: "Marikina City".to_string(),
        location,
        level,
        has_er: true,
    }
}

/// Incident whose condition is the first one listed for `severity`.
pub fn test_incident(
    incident_id: u32,
    location: GeoPoint,
    severity: Severity,
    call_time_ms: SimTime,
) -> Incident {
    let condition = severity
        .conditions()
        .first()
        .copied()
        .unwrap_or(Condition::Fever);
    Incident {
        incident_id,
        location,
        severity,
        condition,
        call_time_ms,
    }
}

/// Simulator over the default Marikina roster with haversine routing.
pub fn marikina_simulator(triage_seed: u64) -> DispatchSimulator {
    DispatchSimulator::new(
        FleetState::from_bases(&default_bases(), 0),
        default_hospitals(),
        GeoDistance::default(),
        triage_seed,
    )
}

/// Simulator with a single one-ambulance base at `base_location`.
pub fn single_unit_simulator(
    base_location: GeoPoint,
    hospitals: Vec<Hospital>,
    triage_seed: u64,
) -> DispatchSimulator {
    DispatchSimulator::new(
        FleetState::from_bases(&[test_base(1, base_location, 1)], 0),
        hospitals,
        GeoDistance::default(),
        triage_seed,
    )
}
