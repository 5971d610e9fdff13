//! Hospitals and the severity-based destination policy used to label dispatches.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::incident::Severity;
use crate::routing::{GeoDistance, TravelEstimate};

pub type HospitalId = u32;

/// Probability that a low-severity patient is routed to the nearest Level-1 hospital.
pub const DEFAULT_LEVEL_ONE_PREFERENCE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: HospitalId,
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
    /// Capability tier; higher tiers handle more severe cases.
    pub level: u8,
    pub has_er: bool,
}

/// Minimum hospital level that may receive a patient of `severity`.
pub fn min_level(severity: Severity) -> u8 {
    match severity {
        Severity::Low => 1,
        Severity::Medium => 3,
        Severity::High => 3,
    }
}

/// Destination chosen for a patient together with the transport leg.
#[derive(Debug, Clone, Copy)]
pub struct HospitalChoice<'a> {
    pub hospital: &'a Hospital,
    pub leg: TravelEstimate,
}

/// Nearest hospital by `geo`, ties resolved in favour of the earlier entry.
pub fn nearest<'a>(
    location: GeoPoint,
    candidates: impl IntoIterator<Item = &'a Hospital>,
    geo: &GeoDistance,
) -> Option<HospitalChoice<'a>> {
    let mut best: Option<HospitalChoice<'a>> = None;
    for hospital in candidates {
        let leg = geo.distance_and_time(location, hospital.location);
        if best.map_or(true, |b| leg.distance_km < b.leg.distance_km) {
            best = Some(HospitalChoice { hospital, leg });
        }
    }
    best
}

/// Triage policy: minimum level per severity, with a stochastic Level-1 bias
/// for low-severity patients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HospitalEligibility {
    pub level_one_preference: f64,
}

impl Default for HospitalEligibility {
    fn default() -> Self {
        Self {
            level_one_preference: DEFAULT_LEVEL_ONE_PREFERENCE,
        }
    }
}

impl HospitalEligibility {
    pub fn is_eligible(hospital: &Hospital, severity: Severity) -> bool {
        hospital.level >= min_level(severity)
    }

    /// Pick the destination hospital, or `None` when no hospital meets the
    /// severity's minimum level. There is deliberately no lower-tier fallback.
    ///
    /// `rng` is only consulted for low-severity patients when a Level-1 hospital exists.
    pub fn select<'a, R: Rng + ?Sized>(
        &self,
        location: GeoPoint,
        severity: Severity,
        hospitals: &'a [Hospital],
        geo: &GeoDistance,
        rng: &mut R,
    ) -> Option<HospitalChoice<'a>> {
        let eligible: Vec<&Hospital> = hospitals
            .iter()
            .filter(|h| Self::is_eligible(h, severity))
            .collect();
        if eligible.is_empty() {
            return None;
        }

        if severity == Severity::Low {
            let level_one: Vec<&Hospital> =
                eligible.iter().copied().filter(|h| h.level == 1).collect();
            if !level_one.is_empty() && rng.gen::<f64>() < self.level_one_preference {
                return nearest(location, level_one, geo);
            }
        }

        nearest(location, eligible, geo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn hospital(id: HospitalId, level: u8, lat: f64, lon: f64) -> Hospital {
        Hospital {
            id,
            name: format!("Hospital {id}"),
            address: String::new(),
            location: GeoPoint::new(lat, lon),
            level,
            has_er: true,
        }
    }

    #[test]
    fn min_level_is_monotonic_in_severity() {
        assert!(min_level(Severity::High) >= min_level(Severity::Medium));
        assert!(min_level(Severity::Medium) >= min_level(Severity::Low));
        let level3 = hospital(1, 3, 14.64, 121.10);
        for severity in Severity::ALL {
            assert!(HospitalEligibility::is_eligible(&level3, severity));
        }
        let level2 = hospital(2, 2, 14.64, 121.10);
        assert!(HospitalEligibility::is_eligible(&level2, Severity::Low));
        assert!(!HospitalEligibility::is_eligible(&level2, Severity::High));
    }

    #[test]
    fn no_eligible_hospital_yields_none() {
        let hospitals = vec![hospital(1, 1, 14.64, 121.10), hospital(2, 2, 14.63, 121.11)];
        let mut rng = StdRng::seed_from_u64(0);
        let choice = HospitalEligibility::default().select(
            GeoPoint::new(14.64, 121.10),
            Severity::High,
            &hospitals,
            &GeoDistance::default(),
            &mut rng,
        );
        assert!(choice.is_none());
    }

    #[test]
    fn high_severity_picks_nearest_level_three() {
        let patient = GeoPoint::new(14.64, 121.10);
        let hospitals = vec![
            hospital(1, 1, 14.6401, 121.1001),
            hospital(2, 3, 14.66, 121.12),
            hospital(3, 3, 14.645, 121.105),
        ];
        let mut rng = StdRng::seed_from_u64(0);
        let choice = HospitalEligibility::default()
            .select(patient, Severity::High, &hospitals, &GeoDistance::default(), &mut rng)
            .unwrap();
        assert_eq!(choice.hospital.id, 3);
    }

    #[test]
    fn ties_go_to_first_in_input_order() {
        let hospitals = vec![hospital(7, 3, 14.65, 121.11), hospital(8, 3, 14.65, 121.11)];
        let choice = nearest(GeoPoint::new(14.64, 121.10), &hospitals, &GeoDistance::default())
            .unwrap();
        assert_eq!(choice.hospital.id, 7);
    }

    #[test]
    fn preference_zero_and_one_are_deterministic() {
        let patient = GeoPoint::new(14.64, 121.10);
        // Level 1 at ~1.1 km, Level 3 at ~0.55 km.
        let hospitals = vec![hospital(1, 1, 14.65, 121.10), hospital(3, 3, 14.645, 121.10)];
        let geo = GeoDistance::default();
        let mut rng = StdRng::seed_from_u64(3);

        let always = HospitalEligibility { level_one_preference: 1.0 };
        let never = HospitalEligibility { level_one_preference: 0.0 };
        for _ in 0..20 {
            let a = always.select(patient, Severity::Low, &hospitals, &geo, &mut rng).unwrap();
            assert_eq!(a.hospital.id, 1);
            let n = never.select(patient, Severity::Low, &hospitals, &geo, &mut rng).unwrap();
            assert_eq!(n.hospital.id, 3);
        }
    }
}
