mod support;

use ems_core::clock::{minutes_to_ms, ONE_MIN_MS};
use ems_core::fleet::{FleetState, UnitKind, UnitStatus};
use ems_core::geo::{haversine_km, GeoPoint};
use ems_core::incident::Severity;
use ems_core::routing::GeoDistance;
use ems_core::scenario::default_hospitals;
use ems_core::simulation::{DispatchSimulator, SimulationError};
use ems_core::test_helpers::{single_unit_simulator, test_base, test_hospital, test_incident};

use support::{assert_close, summed_breakdown};

const FORTUNE_BASE: GeoPoint = GeoPoint::new(14.6628689, 121.1214235);
const PATIENT: GeoPoint = GeoPoint::new(14.6380867, 121.1280829);

#[test]
fn high_severity_goes_to_nearest_level_three() {
    let hospitals = default_hospitals();
    let mut sim = single_unit_simulator(FORTUNE_BASE, hospitals.clone(), 42);
    let call_time = 30 * ONE_MIN_MS;

    let record = sim
        .process(&test_incident(1, PATIENT, Severity::High, call_time))
        .unwrap();

    let expected = hospitals
        .iter()
        .filter(|h| h.level >= 3)
        .min_by(|a, b| {
            haversine_km(PATIENT, a.location).total_cmp(&haversine_km(PATIENT, b.location))
        })
        .unwrap();
    let hospital = record.hospital.as_ref().unwrap();
    assert_eq!(hospital.hospital_id, expected.id);
    assert!(hospital.level >= 3);

    let to_patient = haversine_km(FORTUNE_BASE, PATIENT) / 30.0 * 60.0;
    assert_close(record.breakdown.to_patient_min, to_patient, 0.01);
    assert_eq!(record.call_time_ms, call_time);
    assert_eq!(record.queue_delay_min, 0.0);

    let unit = sim.fleet().unit(record.unit_id).unwrap();
    assert_eq!(unit.kind, UnitKind::Ambulance);
    assert_eq!(unit.status(), UnitStatus::Available);
    assert_eq!(
        unit.next_available_at(),
        call_time + minutes_to_ms(record.total_response_min)
    );
}

#[test]
fn busy_fleet_advances_call_time() {
    let t = 60 * ONE_MIN_MS;
    let mut fleet = FleetState::from_bases(&[test_base(1, FORTUNE_BASE, 1)], 0);
    fleet.dispatch(1, t + 20 * ONE_MIN_MS).unwrap();
    fleet.release(1, t + 20 * ONE_MIN_MS).unwrap();
    let mut sim = DispatchSimulator::new(fleet, default_hospitals(), GeoDistance::default(), 1);

    let record = sim
        .process(&test_incident(1, PATIENT, Severity::Medium, t + 5 * ONE_MIN_MS))
        .unwrap();

    assert_eq!(record.call_time_ms, t + 20 * ONE_MIN_MS);
    assert_close(record.queue_delay_min, 15.0, 1e-9);
    assert_eq!(record.unit_id, 1);
    assert_eq!(sim.now(), t + 20 * ONE_MIN_MS);
    assert_eq!(
        record.call_time.format("%Y-%m-%d %H:%M:%S").to_string(),
        "2025-05-13 09:20:00"
    );
}

#[test]
fn nearest_free_unit_wins_and_ties_go_to_lower_id() {
    let near = GeoPoint::new(14.640, 121.100);
    let far = GeoPoint::new(14.670, 121.125);
    let fleet = FleetState::from_bases(
        &[test_base(10, far, 1), test_base(20, near, 1), test_base(30, near, 1)],
        0,
    );
    let hospitals = vec![test_hospital(1, 3, GeoPoint::new(14.641, 121.101))];
    let mut sim = DispatchSimulator::new(fleet, hospitals, GeoDistance::default(), 3);

    // Units: 1 amb@10, 2 rescue, 3 amb@20, 4 rescue, 5 amb@30, 6 rescue.
    let first = sim.process(&test_incident(1, near, Severity::High, 0)).unwrap();
    assert_eq!(first.unit_id, 3);
    assert_eq!(first.base_id, 20);

    let second = sim.process(&test_incident(2, near, Severity::High, 0)).unwrap();
    assert_eq!(second.unit_id, 5);

    let third = sim.process(&test_incident(3, near, Severity::High, 0)).unwrap();
    assert_eq!(third.unit_id, 1);
}

#[test]
fn no_eligible_hospital_yields_null_assignment() {
    let hospitals = vec![test_hospital(1, 1, GeoPoint::new(14.64, 121.10))];
    let mut sim = single_unit_simulator(FORTUNE_BASE, hospitals, 5);

    let record = sim
        .process(&test_incident(1, PATIENT, Severity::High, 0))
        .unwrap();

    assert!(record.hospital.is_none());
    assert_eq!(record.breakdown.to_hospital_min, 0.0);
    assert_eq!(record.total_response_min, summed_breakdown(&record));
    assert_close(
        record.total_response_min,
        2.0 + record.breakdown.to_patient_min + 10.0 + 5.0,
        1e-9,
    );
}

#[test]
fn out_of_order_incident_leaves_fleet_untouched() {
    let mut sim = single_unit_simulator(FORTUNE_BASE, default_hospitals(), 9);
    sim.process(&test_incident(1, PATIENT, Severity::Low, 10 * ONE_MIN_MS))
        .unwrap();
    let before: Vec<_> = sim.fleet().units().cloned().collect();

    let err = sim
        .process(&test_incident(2, PATIENT, Severity::Low, 5 * ONE_MIN_MS))
        .unwrap_err();

    assert!(matches!(err, SimulationError::OutOfOrder { incident_id: 2, .. }));
    assert_eq!(err.incident_id(), 2);
    let after: Vec<_> = sim.fleet().units().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn fleet_without_ambulances_is_exhausted() {
    let fleet = FleetState::from_bases(&[test_base(1, FORTUNE_BASE, 0)], 0);
    let mut sim = DispatchSimulator::new(fleet, default_hospitals(), GeoDistance::default(), 2);

    let err = sim
        .process(&test_incident(7, PATIENT, Severity::Low, 0))
        .unwrap_err();
    assert!(matches!(err, SimulationError::FleetExhausted { incident_id: 7 }));
    assert_eq!(sim.now(), 0);
}
