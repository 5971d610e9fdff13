//! Scenario parameters and construction of a ready-to-run simulator.
//!
//! Defaults reproduce the Marikina City reference setup: six EMS bases, a
//! 6,000-incident shift starting 2025-05-13 08:00 and seed 42.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{default_epoch, SimulationClock};
use crate::fleet::{EmsBase, FleetState};
use crate::geo::{BoundingBox, GeoPoint, DEFAULT_AVERAGE_SPEED_KMH};
use crate::hospital::{Hospital, HospitalEligibility, DEFAULT_LEVEL_ONE_PREFERENCE};
use crate::incident::{GeneratorError, IncidentGenerator, IncidentGeneratorConfig, SeverityWeights};
use crate::routing::{GeoDistance, RouteProviderKind};
use crate::runner::{run_generated, SimulationOutcome};
use crate::simulation::{DispatchSimulator, TimingConfig};

/// Default bounding box: Marikina City, Metro Manila.
pub const MARIKINA_BBOX: BoundingBox = BoundingBox {
    lat_min: 14.60,
    lat_max: 14.68,
    lon_min: 121.07,
    lon_max: 121.13,
};

const DEFAULT_NUM_INCIDENTS: usize = 6_000;
const DEFAULT_SEED: u64 = 42;

/// Parameters for building a simulation scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioParams {
    pub num_incidents: usize,
    /// `None` draws a fresh seed from the OS.
    pub seed: Option<u64>,
    pub bbox: BoundingBox,
    pub severity_weights: SeverityWeights,
    pub min_call_gap_min: u64,
    pub max_call_gap_min: u64,
    pub average_speed_kmh: f64,
    pub timing: TimingConfig,
    pub level_one_preference: f64,
    /// Wall-clock time corresponding to simulation time 0.
    pub epoch: NaiveDateTime,
    pub route_provider_kind: RouteProviderKind,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            num_incidents: DEFAULT_NUM_INCIDENTS,
            seed: Some(DEFAULT_SEED),
            bbox: MARIKINA_BBOX,
            severity_weights: SeverityWeights::default(),
            min_call_gap_min: 5,
            max_call_gap_min: 15,
            average_speed_kmh: DEFAULT_AVERAGE_SPEED_KMH,
            timing: TimingConfig::default(),
            level_one_preference: DEFAULT_LEVEL_ONE_PREFERENCE,
            epoch: default_epoch(),
            route_provider_kind: RouteProviderKind::default(),
        }
    }
}

impl ScenarioParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_num_incidents(mut self, num_incidents: usize) -> Self {
        self.num_incidents = num_incidents;
        self
    }

    pub fn with_average_speed_kmh(mut self, speed: f64) -> Self {
        self.average_speed_kmh = speed;
        self
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_route_provider(mut self, kind: RouteProviderKind) -> Self {
        self.route_provider_kind = kind;
        self
    }

    /// Seed used for this run (resolves `None` to a random seed).
    pub fn resolved_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }

    pub fn generator_config(&self) -> IncidentGeneratorConfig {
        IncidentGeneratorConfig {
            bbox: self.bbox,
            severity_weights: self.severity_weights,
            min_call_gap_min: self.min_call_gap_min,
            max_call_gap_min: self.max_call_gap_min,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error("average speed must be positive, got {0}")]
    InvalidSpeed(f64),
    #[error("level-one preference must be within [0, 1], got {0}")]
    InvalidPreference(f64),
}

/// The six Marikina EMS bases; bases 163, 166 and 167 house two ambulances.
pub fn default_bases() -> Vec<EmsBase> {
    [
        (163, "163 Base - Barangay Hall IVC", 14.6270218, 121.0797032, 2),
        (166, "166 Base - CHO Office, Barangay Sto.niño", 14.6399746, 121.0965973, 2),
        (167, "167 Base - Barangay Hall Kalumpang", 14.624179, 121.0933239, 2),
        (164, "164 Base - DRRMO Building, Barangay Fortune", 14.6628689, 121.1214235, 1),
        (165, "165 Base - St. Benedict Barangay Nangka", 14.6737274, 121.108795, 1),
        (169, "169 Base - Pugad Lawin, Barangay Fortune", 14.6584306, 121.1312048, 1),
    ]
    .into_iter()
    .map(|(base_id, name, lat, lon, ambulances)| EmsBase {
        base_id,
        base_name: name.to_string(),
        location: GeoPoint::new(lat, lon),
        ambulances,
    })
    .collect()
}

/// Built-in hospital list used when no hospital dataset is supplied.
pub fn default_hospitals() -> Vec<Hospital> {
    [
        ("Amang Rodriguez Memorial Medical Center", 14.636102, 121.098444, 3, true),
        ("Garcia General Hospital", 14.651220, 121.110939, 1, true),
        ("Saint Anthony Medical Center", 14.624501, 121.102796, 2, true),
        ("SDS Medical Center", 14.639426, 121.110105, 1, true),
        ("San Ramon Hospital", 14.644136, 121.117247, 1, false),
        ("Saint Victoria Hospital", 14.642181, 121.094689, 2, true),
        ("St. Vincent Hospital", 14.650954, 121.107627, 2, true),
        ("VT Maternity Hospital", 14.637106, 121.099440, 1, false),
        ("Jesus Immaculate Concepcion Hospital", 14.638366, 121.108958, 1, false),
        ("De Guzman Clinic", 14.657041, 121.106694, 1, false),
        ("Marikina Doctors Hospital and Medical Center", 14.621069, 121.082590, 2, true),
        ("Marikina Valley Medical Center", 14.634896, 121.104121, 3, true),
        ("P. Gonzales Memorial Hospital", 14.649128, 121.098456, 1, false),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (name, lat, lon, level, has_er))| Hospital {
        id: i as u32 + 1,
        name: name.to_string(),
        address: "Marikina City, Metro Manila".to_string(),
        location: GeoPoint::new(lat, lon),
        level,
        has_er,
    })
    .collect()
}

/// Build the simulator and incident generator for `params`.
///
/// The generator and the triage stream are seeded from the same scenario seed,
/// so a fixed seed reproduces the whole run.
pub fn build_scenario(
    params: &ScenarioParams,
    bases: &[EmsBase],
    hospitals: Vec<Hospital>,
) -> Result<(DispatchSimulator, IncidentGenerator), ScenarioError> {
    if !(params.average_speed_kmh > 0.0) {
        return Err(ScenarioError::InvalidSpeed(params.average_speed_kmh));
    }
    if !(0.0..=1.0).contains(&params.level_one_preference) {
        return Err(ScenarioError::InvalidPreference(params.level_one_preference));
    }

    let seed = params.resolved_seed();
    let generator = IncidentGenerator::new(params.generator_config(), seed)?;
    let geo = GeoDistance::from_kind(&params.route_provider_kind, params.average_speed_kmh);
    let simulator = DispatchSimulator::new(
        FleetState::from_bases(bases, 0),
        hospitals,
        geo,
        seed.wrapping_add(1),
    )
    .with_clock(SimulationClock::with_epoch(params.epoch))
    .with_timing(params.timing)
    .with_eligibility(HospitalEligibility {
        level_one_preference: params.level_one_preference,
    });

    Ok((simulator, generator))
}

/// Build and run a generated scenario to completion.
pub fn run_scenario(
    params: &ScenarioParams,
    bases: &[EmsBase],
    hospitals: Vec<Hospital>,
) -> Result<(DispatchSimulator, SimulationOutcome), ScenarioError> {
    let (mut simulator, mut generator) = build_scenario(params, bases, hospitals)?;
    let outcome = run_generated(&mut simulator, &mut generator, params.num_incidents);
    Ok((simulator, outcome))
}
