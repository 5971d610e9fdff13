#![allow(dead_code)]

use ems_core::scenario::{default_bases, default_hospitals, run_scenario, ScenarioParams};
use ems_core::simulation::DispatchRecord;

pub fn simulated_records(seed: u64, incidents: usize) -> Vec<DispatchRecord> {
    let params = ScenarioParams::default()
        .with_seed(seed)
        .with_num_incidents(incidents);
    let (_, outcome) = run_scenario(&params, &default_bases(), default_hospitals())
        .expect("default scenario builds");
    outcome.records
}
