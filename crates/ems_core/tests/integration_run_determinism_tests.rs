mod support;

use std::collections::BTreeMap;

use ems_core::clock::minutes_to_ms;
use ems_core::fleet::UnitStatus;
use ems_core::incident::{IncidentGenerator, Severity};
use ems_core::runner::{run_generated, run_incidents};
use ems_core::scenario::{
    build_scenario, default_bases, default_hospitals, run_scenario, ScenarioParams,
};
use ems_core::simulation::DispatchRecord;
use ems_core::test_helpers::marikina_simulator;

use support::summed_breakdown;

fn params(seed: u64, incidents: usize) -> ScenarioParams {
    ScenarioParams::default()
        .with_seed(seed)
        .with_num_incidents(incidents)
}

fn run(seed: u64, incidents: usize) -> Vec<DispatchRecord> {
    let (_, outcome) = run_scenario(&params(seed, incidents), &default_bases(), default_hospitals())
        .unwrap();
    assert!(outcome.failures.is_empty());
    outcome.records
}

#[test]
fn fixed_seed_reproduces_records() {
    let first = run(42, 400);
    let second = run(42, 400);
    assert_eq!(first.len(), 400);
    assert_eq!(first, second);
}

#[test]
fn different_seeds_diverge() {
    assert_ne!(run(1, 50), run(2, 50));
}

#[test]
fn every_record_decomposes_exactly() {
    for record in run(7, 500) {
        assert_eq!(record.total_response_min, summed_breakdown(&record));
        assert_eq!(record.breakdown.dispatch_min, 2.0);
        assert_eq!(record.breakdown.on_scene_min, 10.0);
        assert_eq!(record.breakdown.handover_min, 5.0);
        if record.hospital.is_none() {
            assert_eq!(record.breakdown.to_hospital_min, 0.0);
        }
    }
}

#[test]
fn units_are_never_double_booked() {
    let (sim, outcome) =
        run_scenario(&params(11, 2_000), &default_bases(), default_hospitals()).unwrap();

    let mut last_free: BTreeMap<u32, u64> = BTreeMap::new();
    let mut previous_call = 0;
    for record in &outcome.records {
        assert!(record.call_time_ms >= previous_call);
        previous_call = record.call_time_ms;

        let free_at = last_free.entry(record.unit_id).or_insert(0);
        assert!(record.call_time_ms >= *free_at, "unit {} double booked", record.unit_id);
        assert!(record.available_again_at() >= record.call_time_ms);
        *free_at = record.available_again_at();
    }

    for unit in sim.fleet().units() {
        assert_eq!(unit.status(), UnitStatus::Available);
        if let Some(&free_at) = last_free.get(&unit.unit_id) {
            assert_eq!(unit.next_available_at(), free_at);
        }
    }
}

#[test]
fn queued_calls_start_when_an_ambulance_frees_up() {
    let (_, outcome) =
        run_scenario(&params(3, 3_000), &default_bases(), default_hospitals()).unwrap();
    for record in outcome.records.iter().filter(|r| r.queue_delay_min > 0.0) {
        let freed = outcome
            .records
            .iter()
            .any(|other| other.available_again_at() == record.call_time_ms);
        assert!(freed, "incident {} waited for nothing", record.incident_id);
    }
}

#[test]
fn batch_runner_orders_by_call_time() {
    let scenario = params(5, 0);
    let mut generator = IncidentGenerator::new(scenario.generator_config(), 5).unwrap();
    let mut incidents = generator.generate(30, 0);
    incidents.reverse();

    let mut sim = marikina_simulator(5);
    let outcome = run_incidents(&mut sim, &incidents);
    assert!(outcome.failures.is_empty());
    let ids: Vec<u32> = outcome.records.iter().map(|r| r.incident_id).collect();
    let expected: Vec<u32> = (1..=30).collect();
    assert_eq!(ids, expected);
}

#[test]
fn summary_counts_match_records() {
    let (mut sim, mut generator) =
        build_scenario(&params(21, 0), &default_bases(), default_hospitals()).unwrap();
    let outcome = run_generated(&mut sim, &mut generator, 800);
    let summary = outcome.summary();

    assert_eq!(summary.dispatched, 800);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.estimated, 800);
    let per_severity: usize = summary.by_severity.values().map(|s| s.count).sum();
    assert_eq!(per_severity, 800);
    assert!(summary.by_severity.contains_key(&Severity::High));
    let with_hospital: usize = summary.by_hospital.values().sum();
    assert_eq!(with_hospital + summary.without_hospital, 800);
    assert!(summary.p90_response_min >= summary.median_response_min);
    assert!(minutes_to_ms(summary.max_queue_delay_min) <= sim.now());
}
