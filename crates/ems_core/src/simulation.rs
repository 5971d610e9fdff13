//! Dispatch simulator: matches each incident to the nearest free ambulance,
//! picks a destination hospital and books the unit until the run completes.
//!
//! Incidents must arrive in non-decreasing call-time order. Per incident:
//!
//! 1. If no ambulance is free at the nominal call time, the call waits until the
//!    earliest ambulance becomes available (queueing delay).
//! 2. The free ambulance whose base is nearest to the patient is chosen
//!    (ties go to the lowest unit id).
//! 3. [`HospitalEligibility`] picks the destination; `None` is a legitimate outcome.
//! 4. The unit is dispatched and released at `call_time + total_response`.
//!
//! Every decision is made before the fleet is touched, so an incident that fails
//! leaves [`FleetState`] exactly as it was.

use chrono::NaiveDateTime;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{minutes_to_ms, ms_to_minutes, SimTime, SimulationClock};
use crate::fleet::{FleetError, FleetState, UnitId, UnitKind};
use crate::geo::GeoPoint;
use crate::hospital::{Hospital, HospitalEligibility, HospitalId};
use crate::incident::{Condition, Incident, Severity};
use crate::routing::{GeoDistance, TravelEstimate};

/// Fixed response-time components, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    pub dispatch_min: f64,
    pub on_scene_min: f64,
    pub handover_min: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            dispatch_min: 2.0,
            on_scene_min: 10.0,
            handover_min: 5.0,
        }
    }
}

impl TimingConfig {
    pub fn breakdown(&self, to_patient_min: f64, to_hospital_min: f64) -> ResponseBreakdown {
        ResponseBreakdown {
            dispatch_min: self.dispatch_min,
            to_patient_min,
            on_scene_min: self.on_scene_min,
            to_hospital_min,
            handover_min: self.handover_min,
        }
    }
}

/// Response-time decomposition of one dispatch, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseBreakdown {
    pub dispatch_min: f64,
    pub to_patient_min: f64,
    pub on_scene_min: f64,
    pub to_hospital_min: f64,
    pub handover_min: f64,
}

impl ResponseBreakdown {
    pub fn total(&self) -> f64 {
        self.dispatch_min
            + self.to_patient_min
            + self.on_scene_min
            + self.to_hospital_min
            + self.handover_min
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalAssignment {
    pub hospital_id: HospitalId,
    pub hospital_name: String,
    pub level: u8,
    pub distance_km: f64,
}

/// Outcome of simulating one incident; one row of the training corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub incident_id: u32,
    pub location: GeoPoint,
    pub severity: Severity,
    pub condition: Condition,
    /// Effective call time, after any queueing delay.
    pub call_time_ms: SimTime,
    pub call_time: NaiveDateTime,
    pub queue_delay_min: f64,
    pub unit_id: UnitId,
    pub base_id: u32,
    pub base_name: String,
    pub distance_to_patient_km: f64,
    /// `None` when no hospital meets the severity's minimum level.
    pub hospital: Option<HospitalAssignment>,
    pub breakdown: ResponseBreakdown,
    pub total_response_min: f64,
    /// At least one leg used the haversine estimate.
    pub is_estimated: bool,
}

impl DispatchRecord {
    pub fn hospital_id(&self) -> Option<HospitalId> {
        self.hospital.as_ref().map(|h| h.hospital_id)
    }

    pub fn distance_to_hospital_km(&self) -> Option<f64> {
        self.hospital.as_ref().map(|h| h.distance_km)
    }

    pub fn available_again_at(&self) -> SimTime {
        self.call_time_ms + minutes_to_ms(self.total_response_min)
    }
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("incident {incident_id}: no ambulance available")]
    FleetExhausted { incident_id: u32 },
    #[error("incident {incident_id}: call time {call_time_ms} precedes previous call at {previous_ms}")]
    OutOfOrder {
        incident_id: u32,
        call_time_ms: SimTime,
        previous_ms: SimTime,
    },
    #[error("incident {incident_id}: response time {total_min} min is not a finite duration")]
    InvalidResponseTime { incident_id: u32, total_min: f64 },
    #[error("incident {incident_id}: {source}")]
    Fleet {
        incident_id: u32,
        #[source]
        source: FleetError,
    },
}

impl SimulationError {
    pub fn incident_id(&self) -> u32 {
        match self {
            SimulationError::FleetExhausted { incident_id }
            | SimulationError::OutOfOrder { incident_id, .. }
            | SimulationError::InvalidResponseTime { incident_id, .. }
            | SimulationError::Fleet { incident_id, .. } => *incident_id,
        }
    }
}

/// Sequential dispatch simulator. Owns the fleet and the triage random stream.
#[derive(Debug)]
pub struct DispatchSimulator {
    clock: SimulationClock,
    fleet: FleetState,
    hospitals: Vec<Hospital>,
    geo: GeoDistance,
    eligibility: HospitalEligibility,
    timing: TimingConfig,
    triage_rng: StdRng,
    /// Latest nominal call time accepted. The clock itself may run ahead of it
    /// when calls are queued.
    last_call_ms: SimTime,
}

impl DispatchSimulator {
    pub fn new(
        fleet: FleetState,
        hospitals: Vec<Hospital>,
        geo: GeoDistance,
        triage_seed: u64,
    ) -> Self {
        Self {
            clock: SimulationClock::default(),
            fleet,
            hospitals,
            geo,
            eligibility: HospitalEligibility::default(),
            timing: TimingConfig::default(),
            triage_rng: StdRng::seed_from_u64(triage_seed),
            last_call_ms: 0,
        }
    }

    pub fn with_clock(mut self, clock: SimulationClock) -> Self {
        self.last_call_ms = clock.now();
        self.clock = clock;
        self
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_eligibility(mut self, eligibility: HospitalEligibility) -> Self {
        self.eligibility = eligibility;
        self
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut SimulationClock {
        &mut self.clock
    }

    pub fn fleet(&self) -> &FleetState {
        &self.fleet
    }

    pub fn hospitals(&self) -> &[Hospital] {
        &self.hospitals
    }

    pub fn geo(&self) -> &GeoDistance {
        &self.geo
    }

    pub fn timing(&self) -> TimingConfig {
        self.timing
    }

    /// Effective call time: the nominal time, or the earliest ambulance availability
    /// if every ambulance is still busy then.
    fn effective_call_time(&self, incident: &Incident) -> Result<SimTime, SimulationError> {
        let nominal = incident.call_time_ms;
        if !self.fleet.available_units(UnitKind::Ambulance, nominal).is_empty() {
            return Ok(nominal);
        }
        let earliest = self
            .fleet
            .earliest_available(UnitKind::Ambulance)
            .ok_or(SimulationError::FleetExhausted {
                incident_id: incident.incident_id,
            })?;
        Ok(nominal.max(earliest))
    }

    fn nearest_unit(
        &self,
        location: GeoPoint,
        call_time: SimTime,
    ) -> Option<(UnitId, TravelEstimate)> {
        let mut best: Option<(UnitId, TravelEstimate)> = None;
        for unit_id in self.fleet.available_units(UnitKind::Ambulance, call_time) {
            let Some(unit) = self.fleet.unit(unit_id) else {
                continue;
            };
            let leg = self.geo.distance_and_time(unit.base_location, location);
            if best.map_or(true, |(_, b)| leg.distance_km < b.distance_km) {
                best = Some((unit_id, leg));
            }
        }
        best
    }

    fn home_base(
        &self,
        incident_id: u32,
        unit_id: UnitId,
    ) -> Result<(u32, String), SimulationError> {
        self.fleet
            .unit(unit_id)
            .map(|unit| (unit.base_id, unit.base_name.clone()))
            .ok_or(SimulationError::Fleet {
                incident_id,
                source: FleetError::InvalidTransition {
                    unit_id,
                    reason: "unknown unit",
                },
            })
    }

    pub fn process(&mut self, incident: &Incident) -> Result<DispatchRecord, SimulationError> {
        let incident_id = incident.incident_id;
        if incident.call_time_ms < self.last_call_ms {
            return Err(SimulationError::OutOfOrder {
                incident_id,
                call_time_ms: incident.call_time_ms,
                previous_ms: self.last_call_ms,
            });
        }

        let call_time = self.effective_call_time(incident)?;
        let (unit_id, to_patient) = self
            .nearest_unit(incident.location, call_time)
            .ok_or(SimulationError::FleetExhausted { incident_id })?;

        let choice = self.eligibility.select(
            incident.location,
            incident.severity,
            &self.hospitals,
            &self.geo,
            &mut self.triage_rng,
        );
        let (hospital, to_hospital_min, hospital_estimated) = match choice {
            Some(choice) => (
                Some(HospitalAssignment {
                    hospital_id: choice.hospital.id,
                    hospital_name: choice.hospital.name.clone(),
                    level: choice.hospital.level,
                    distance_km: choice.leg.distance_km,
                }),
                choice.leg.duration_min,
                choice.leg.is_estimated,
            ),
            None => (None, 0.0, false),
        };

        let breakdown = self.timing.breakdown(to_patient.duration_min, to_hospital_min);
        let total_response_min = breakdown.total();
        if !total_response_min.is_finite() || total_response_min < 0.0 {
            return Err(SimulationError::InvalidResponseTime {
                incident_id,
                total_min: total_response_min,
            });
        }
        let available_at = call_time + minutes_to_ms(total_response_min);

        let (base_id, base_name) = self.home_base(incident_id, unit_id)?;
        self.fleet
            .dispatch(unit_id, available_at)
            .and_then(|_| self.fleet.release(unit_id, available_at))
            .map_err(|source| SimulationError::Fleet { incident_id, source })?;
        self.clock.advance_to(call_time);
        self.last_call_ms = incident.call_time_ms;

        debug!(
            "incident {} ({}) -> unit {} from base {}, hospital {:?}, response {:.2} min",
            incident_id,
            incident.severity,
            unit_id,
            base_id,
            hospital.as_ref().map(|h| h.hospital_id),
            total_response_min
        );

        Ok(DispatchRecord {
            incident_id,
            location: incident.location,
            severity: incident.severity,
            condition: incident.condition,
            call_time_ms: call_time,
            call_time: self.clock.to_datetime(call_time),
            queue_delay_min: ms_to_minutes(call_time - incident.call_time_ms),
            unit_id,
            base_id,
            base_name,
            distance_to_patient_km: to_patient.distance_km,
            hospital,
            breakdown,
            total_response_min,
            is_estimated: to_patient.is_estimated || hospital_estimated,
        })
    }
}
