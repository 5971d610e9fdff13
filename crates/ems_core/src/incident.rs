//! Incidents: triage vocabulary and the seeded synthetic incident generator.

use std::fmt;
use std::str::FromStr;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{SimTime, ONE_MIN_MS};
use crate::geo::{BoundingBox, GeoPoint};

/// Triage category of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Conditions a patient of this severity may present with.
    pub fn conditions(&self) -> &'static [Condition] {
        match self {
            Severity::Low => &[Condition::MinorInjury, Condition::Fever, Condition::Laceration],
            Severity::Medium => &[
                Condition::Fracture,
                Condition::ModerateRespiratoryDistress,
                Condition::AbdominalPain,
            ],
            Severity::High => &[Condition::HeartAttack, Condition::MajorTrauma, Condition::Stroke],
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseCategoryError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Severity {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(ParseCategoryError {
                kind: "severity",
                value: s.to_string(),
            }),
        }
    }
}

/// Presenting condition; three per severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "Minor injury")]
    MinorInjury,
    Fever,
    Laceration,
    Fracture,
    #[serde(rename = "Moderate respiratory distress")]
    ModerateRespiratoryDistress,
    #[serde(rename = "Abdominal pain")]
    AbdominalPain,
    #[serde(rename = "Heart attack")]
    HeartAttack,
    #[serde(rename = "Major trauma")]
    MajorTrauma,
    Stroke,
}

impl Condition {
    pub const ALL: [Condition; 9] = [
        Condition::MinorInjury,
        Condition::Fever,
        Condition::Laceration,
        Condition::Fracture,
        Condition::ModerateRespiratoryDistress,
        Condition::AbdominalPain,
        Condition::HeartAttack,
        Condition::MajorTrauma,
        Condition::Stroke,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::MinorInjury => "Minor injury",
            Condition::Fever => "Fever",
            Condition::Laceration => "Laceration",
            Condition::Fracture => "Fracture",
            Condition::ModerateRespiratoryDistress => "Moderate respiratory distress",
            Condition::AbdominalPain => "Abdominal pain",
            Condition::HeartAttack => "Heart attack",
            Condition::MajorTrauma => "Major trauma",
            Condition::Stroke => "Stroke",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Condition::MinorInjury | Condition::Fever | Condition::Laceration => Severity::Low,
            Condition::Fracture
            | Condition::ModerateRespiratoryDistress
            | Condition::AbdominalPain => Severity::Medium,
            Condition::HeartAttack | Condition::MajorTrauma | Condition::Stroke => Severity::High,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = ParseCategoryError;

    /// Condition names are matched exactly (case-sensitive), as they are dataset labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Condition::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == trimmed)
            .ok_or_else(|| ParseCategoryError {
                kind: "condition",
                value: s.to_string(),
            })
    }
}

/// A simulated patient emergency. Read-only once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub incident_id: u32,
    pub location: GeoPoint,
    pub severity: Severity,
    pub condition: Condition,
    /// Nominal call time; the simulator may delay it when no ambulance is free.
    pub call_time_ms: SimTime,
}

/// Relative frequency of each severity in generated incidents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityWeights {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            low: 0.5,
            medium: 0.3,
            high: 0.2,
        }
    }
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("invalid severity weights: {0}")]
    InvalidWeights(#[from] rand::distributions::WeightedError),
    #[error("invalid call gap range {min}..{max} minutes")]
    InvalidGap { min: u64, max: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncidentGeneratorConfig {
    pub bbox: BoundingBox,
    pub severity_weights: SeverityWeights,
    /// Whole minutes between consecutive calls, sampled uniformly in `[min, max)`.
    /// The defaults (5, 15) therefore never produce a 15-minute gap.
    pub min_call_gap_min: u64,
    pub max_call_gap_min: u64,
}

/// Seeded generator of synthetic incidents.
///
/// Sampling order per incident is fixed (lat, lon, severity, condition, call gap),
/// so a given seed always yields the same stream.
#[derive(Debug)]
pub struct IncidentGenerator {
    config: IncidentGeneratorConfig,
    rng: StdRng,
    severity_dist: WeightedIndex<f64>,
    generated: u32,
}

impl IncidentGenerator {
    pub fn new(config: IncidentGeneratorConfig, seed: u64) -> Result<Self, GeneratorError> {
        let w = config.severity_weights;
        let severity_dist = WeightedIndex::new([w.low, w.medium, w.high])?;
        if config.min_call_gap_min >= config.max_call_gap_min {
            return Err(GeneratorError::InvalidGap {
                min: config.min_call_gap_min,
                max: config.max_call_gap_min,
            });
        }
        Ok(Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            severity_dist,
            generated: 0,
        })
    }

    pub fn generated(&self) -> u32 {
        self.generated
    }

    /// Next incident, called in some minutes after `now`.
    pub fn next_incident(&mut self, now: SimTime) -> Incident {
        let bbox = self.config.bbox;
        let lat = self.rng.gen_range(bbox.lat_min..bbox.lat_max);
        let lon = self.rng.gen_range(bbox.lon_min..bbox.lon_max);
        let severity = Severity::ALL[self.severity_dist.sample(&mut self.rng)];
        let condition = *severity
            .conditions()
            .choose(&mut self.rng)
            .unwrap_or(&severity.conditions()[0]);
        let gap_min = self
            .rng
            .gen_range(self.config.min_call_gap_min..self.config.max_call_gap_min);

        self.generated += 1;
        Incident {
            incident_id: self.generated,
            location: GeoPoint::new(lat, lon),
            severity,
            condition,
            call_time_ms: now + gap_min * ONE_MIN_MS,
        }
    }

    /// A batch of `count` incidents with cumulative nominal call times from `start`.
    pub fn generate(&mut self, count: usize, start: SimTime) -> Vec<Incident> {
        let mut now = start;
        (0..count)
            .map(|_| {
                let incident = self.next_incident(now);
                now = incident.call_time_ms;
                incident
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> IncidentGeneratorConfig {
        IncidentGeneratorConfig {
            bbox: BoundingBox {
                lat_min: 14.60,
                lat_max: 14.68,
                lon_min: 121.07,
                lon_max: 121.13,
            },
            severity_weights: SeverityWeights::default(),
            min_call_gap_min: 5,
            max_call_gap_min: 15,
        }
    }

    #[test]
    fn severity_parse_is_case_insensitive() {
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!(" low ".parse::<Severity>().unwrap(), Severity::Low);
        assert!("critical".parse::<Severity>().is_err());
    }

    #[test]
    fn condition_vocabulary_round_trips() {
        for condition in Condition::ALL {
            assert_eq!(condition.as_str().parse::<Condition>().unwrap(), condition);
            assert!(condition.severity().conditions().contains(&condition));
        }
        assert!("fever".parse::<Condition>().is_err());
    }

    #[test]
    fn generated_incidents_stay_in_bbox_and_vocabulary() {
        let mut generator = IncidentGenerator::new(config(), 42).unwrap();
        let incidents = generator.generate(200, 0);
        let mut previous = 0;
        for incident in &incidents {
            assert!(config().bbox.contains(incident.location));
            assert_eq!(incident.condition.severity(), incident.severity);
            let gap = incident.call_time_ms - previous;
            assert!((5 * ONE_MIN_MS..15 * ONE_MIN_MS).contains(&gap));
            previous = incident.call_time_ms;
        }
        assert_eq!(incidents.last().map(|i| i.incident_id), Some(200));
    }

    #[test]
    fn same_seed_same_stream() {
        let a = IncidentGenerator::new(config(), 7).unwrap().generate(50, 0);
        let b = IncidentGenerator::new(config(), 7).unwrap().generate(50, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn severity_mix_tracks_weights() {
        let mut generator = IncidentGenerator::new(config(), 1).unwrap();
        let incidents = generator.generate(5_000, 0);
        let low = incidents.iter().filter(|i| i.severity == Severity::Low).count() as f64;
        let high = incidents.iter().filter(|i| i.severity == Severity::High).count() as f64;
        assert!((low / 5_000.0 - 0.5).abs() < 0.05);
        assert!((high / 5_000.0 - 0.2).abs() < 0.05);
    }

    #[test]
    fn rejects_degenerate_config() {
        let mut bad = config();
        bad.severity_weights = SeverityWeights {
            low: 0.0,
            medium: 0.0,
            high: 0.0,
        };
        assert!(IncidentGenerator::new(bad, 0).is_err());

        let mut bad_gap = config();
        bad_gap.min_call_gap_min = 11;
        bad_gap.max_call_gap_min = 10;
        assert!(IncidentGenerator::new(bad_gap, 0).is_err());

        // Half-open range: equal bounds leave nothing to sample.
        let mut empty_gap = config();
        empty_gap.min_call_gap_min = 10;
        empty_gap.max_call_gap_min = 10;
        assert!(matches!(
            IncidentGenerator::new(empty_gap, 0),
            Err(GeneratorError::InvalidGap { min: 10, max: 10 })
        ));
    }

    #[test]
    fn call_gap_excludes_upper_bound() {
        let mut generator = IncidentGenerator::new(config(), 42).unwrap();
        let incidents = generator.generate(5_000, 0);
        let mut previous = 0;
        let mut gaps = Vec::with_capacity(incidents.len());
        for incident in &incidents {
            gaps.push((incident.call_time_ms - previous) / ONE_MIN_MS);
            previous = incident.call_time_ms;
        }
        assert_eq!(gaps.iter().copied().max(), Some(14));
        assert_eq!(gaps.iter().copied().min(), Some(5));
    }
}
