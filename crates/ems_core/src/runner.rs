//! Simulation driver: feeds incidents to the [`DispatchSimulator`] in call-time order.
//!
//! Per-incident failures are logged with the incident id and collected; the run
//! continues with the next incident.

use log::{error, info, warn};

use crate::incident::{Incident, IncidentGenerator};
use crate::simulation::{DispatchRecord, DispatchSimulator, SimulationError};
use crate::telemetry::SimulationSummary;

#[derive(Debug, Default)]
pub struct SimulationOutcome {
    pub records: Vec<DispatchRecord>,
    pub failures: Vec<SimulationError>,
}

impl SimulationOutcome {
    pub fn summary(&self) -> SimulationSummary {
        SimulationSummary::from_records(&self.records, self.failures.len())
    }

    fn push(&mut self, result: Result<DispatchRecord, SimulationError>) {
        match result {
            Ok(record) => self.records.push(record),
            Err(err) => {
                error!("dispatch failed: {err}");
                self.failures.push(err);
            }
        }
    }

    fn log_summary(&self) {
        let summary = self.summary();
        info!(
            "simulation finished: {} dispatched, {} failed, {} without hospital, {} queued, avg response {:.2} min",
            summary.dispatched,
            summary.failed,
            summary.without_hospital,
            summary.queued,
            summary.avg_response_min
        );
    }
}

/// Process a fixed batch. Incidents are queued on the simulation clock, so the
/// batch need not be sorted; equal call times keep their batch order.
pub fn run_incidents(sim: &mut DispatchSimulator, incidents: &[Incident]) -> SimulationOutcome {
    for (index, incident) in incidents.iter().enumerate() {
        sim.clock_mut().schedule_call(incident.call_time_ms, index);
    }

    let mut outcome = SimulationOutcome::default();
    while let Some(event) = sim.clock_mut().pop_next() {
        let Some(incident) = incidents.get(event.index) else {
            warn!(
                "skipping event at {} ms: index {} is outside the batch of {}",
                event.timestamp,
                event.index,
                incidents.len()
            );
            continue;
        };
        let result = sim.process(incident);
        outcome.push(result);
    }
    outcome.log_summary();
    outcome
}

/// Generate and process `count` incidents, each called a few minutes after the
/// simulator's current time (which already includes any queueing delay).
pub fn run_generated(
    sim: &mut DispatchSimulator,
    generator: &mut IncidentGenerator,
    count: usize,
) -> SimulationOutcome {
    let mut outcome = SimulationOutcome::default();
    for _ in 0..count {
        let incident = generator.next_incident(sim.now());
        let result = sim.process(&incident);
        outcome.push(result);
    }
    outcome.log_summary();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ONE_MIN_MS;
    use crate::incident::Severity;
    use crate::test_helpers::{marikina_simulator, test_incident, TEST_LOCATION};

    #[test]
    fn stray_clock_events_are_skipped() {
        let mut sim = marikina_simulator(3);
        sim.clock_mut().schedule_call(ONE_MIN_MS, 99);
        let incidents = vec![
            test_incident(1, TEST_LOCATION, Severity::Low, 0),
            test_incident(2, TEST_LOCATION, Severity::High, 2 * ONE_MIN_MS),
        ];

        let outcome = run_incidents(&mut sim, &incidents);

        assert!(outcome.failures.is_empty());
        let ids: Vec<u32> = outcome.records.iter().map(|r| r.incident_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(sim.clock().pending(), 0);
    }
}
