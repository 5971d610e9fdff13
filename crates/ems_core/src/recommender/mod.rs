//! Hospital recommender: a classifier trained on simulated dispatches that
//! reproduces the triage policy from location, category and derived figures.

mod classifier;
mod encoder;
mod forest;

pub use classifier::{ClassifierError, FeatureRow, HospitalClassifier, FEATURE_NAMES, NUM_FEATURES};
pub use encoder::LabelEncoder;
pub use forest::{DecisionTree, ForestConfig, MaxFeatures, RandomForest};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fleet::EmsBase;
use crate::geo::GeoPoint;
use crate::hospital::{Hospital, HospitalId};
use crate::routing::{GeoDistance, TravelEstimate};
use crate::simulation::{DispatchRecord, ResponseBreakdown, TimingConfig};

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("unknown {field} value {value:?}")]
    UnknownCategory { field: String, value: String },
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("model predicted hospital {0}, which is not in the roster")]
    UnknownHospital(HospitalId),
    #[error("no {0} configured")]
    EmptyRoster(&'static str),
}

/// One labelled row of the training corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub location: GeoPoint,
    pub severity: String,
    pub condition: String,
    pub distance_to_hospital_km: f64,
    pub response_time_min: f64,
    pub hospital_id: HospitalId,
}

impl TrainingExample {
    /// Records without a destination hospital carry no label and are skipped.
    pub fn from_record(record: &DispatchRecord) -> Option<Self> {
        let hospital = record.hospital.as_ref()?;
        Some(Self {
            location: record.location,
            severity: record.severity.as_str().to_string(),
            condition: record.condition.as_str().to_string(),
            distance_to_hospital_km: hospital.distance_km,
            response_time_min: record.total_response_min,
            hospital_id: hospital.hospital_id,
        })
    }
}

/// Trained classifier bundled with the category encoders it was fitted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalModel<C = RandomForest> {
    classifier: C,
    severity_encoder: LabelEncoder,
    condition_encoder: LabelEncoder,
}

impl<C: HospitalClassifier> HospitalModel<C> {
    /// Fit the encoders on the examples' vocabulary, then the classifier.
    pub fn fit(examples: &[TrainingExample], classifier: C) -> Result<Self, RecommendError> {
        let mut model = Self::with_vocabulary(examples, classifier);
        model.fit_classifier(examples)?;
        Ok(model)
    }

    /// Unfitted model whose encoders cover the categories seen in `examples`.
    pub fn with_vocabulary(examples: &[TrainingExample], classifier: C) -> Self {
        Self {
            classifier,
            severity_encoder: LabelEncoder::fit("severity", examples.iter().map(|e| &e.severity)),
            condition_encoder: LabelEncoder::fit(
                "condition",
                examples.iter().map(|e| &e.condition),
            ),
        }
    }

    /// Refit the classifier only; the encoders are left as they are.
    pub fn fit_classifier(&mut self, examples: &[TrainingExample]) -> Result<(), RecommendError> {
        let rows = examples
            .iter()
            .map(|e| self.encode_example(e))
            .collect::<Result<Vec<_>, _>>()?;
        let labels: Vec<HospitalId> = examples.iter().map(|e| e.hospital_id).collect();
        self.classifier.fit(&rows, &labels)?;
        Ok(())
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn severity_encoder(&self) -> &LabelEncoder {
        &self.severity_encoder
    }

    pub fn condition_encoder(&self) -> &LabelEncoder {
        &self.condition_encoder
    }

    pub fn encode(
        &self,
        location: GeoPoint,
        severity: &str,
        condition: &str,
        distance_to_hospital_km: f64,
        response_time_min: f64,
    ) -> Result<FeatureRow, RecommendError> {
        Ok([
            location.lat,
            location.lon,
            self.severity_encoder.transform(severity)? as f64,
            self.condition_encoder.transform(condition)? as f64,
            distance_to_hospital_km,
            response_time_min,
        ])
    }

    pub fn encode_example(&self, example: &TrainingExample) -> Result<FeatureRow, RecommendError> {
        self.encode(
            example.location,
            &example.severity,
            &example.condition,
            example.distance_to_hospital_km,
            example.response_time_min,
        )
    }

    pub fn predict(
        &self,
        location: GeoPoint,
        severity: &str,
        condition: &str,
        distance_to_hospital_km: f64,
        response_time_min: f64,
    ) -> Result<HospitalId, RecommendError> {
        let row = self.encode(
            location,
            severity,
            condition,
            distance_to_hospital_km,
            response_time_min,
        )?;
        Ok(self.classifier.predict(&row)?)
    }
}

/// Inputs the recommender computes for a bare location.
#[derive(Debug, Clone, Copy)]
pub struct DerivedFeatures<'a> {
    pub base: &'a EmsBase,
    pub to_patient: TravelEstimate,
    pub closest_hospital: &'a Hospital,
    pub to_hospital: TravelEstimate,
    pub breakdown: ResponseBreakdown,
}

impl DerivedFeatures<'_> {
    pub fn distance_to_hospital_km(&self) -> f64 {
        self.to_hospital.distance_km
    }

    pub fn response_time_min(&self) -> f64 {
        self.breakdown.total()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Recommendation<'a> {
    pub hospital: &'a Hospital,
    pub features: DerivedFeatures<'a>,
}

pub struct HospitalRecommender<C = RandomForest> {
    model: HospitalModel<C>,
    bases: Vec<EmsBase>,
    hospitals: Vec<Hospital>,
    geo: GeoDistance,
    timing: TimingConfig,
}

impl<C: HospitalClassifier> HospitalRecommender<C> {
    pub fn new(
        model: HospitalModel<C>,
        bases: Vec<EmsBase>,
        hospitals: Vec<Hospital>,
        geo: GeoDistance,
    ) -> Self {
        Self {
            model,
            bases,
            hospitals,
            geo,
            timing: TimingConfig::default(),
        }
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    pub fn model(&self) -> &HospitalModel<C> {
        &self.model
    }

    pub fn hospitals(&self) -> &[Hospital] {
        &self.hospitals
    }

    pub fn recommend(
        &self,
        location: GeoPoint,
        severity: &str,
        condition: &str,
        distance_to_hospital_km: f64,
        response_time_min: f64,
    ) -> Result<HospitalId, RecommendError> {
        self.model.predict(
            location,
            severity,
            condition,
            distance_to_hospital_km,
            response_time_min,
        )
    }

    /// Closest base and closest hospital, each leg routed once. The response
    /// time uses the simulator's full timing decomposition.
    pub fn derive_features(
        &self,
        location: GeoPoint,
    ) -> Result<DerivedFeatures<'_>, RecommendError> {
        let (base, to_patient) = closest(&self.bases, location, &self.geo, |b| b.location)
            .ok_or(RecommendError::EmptyRoster("EMS bases"))?;
        let (closest_hospital, to_hospital) =
            closest(&self.hospitals, location, &self.geo, |h| h.location)
                .ok_or(RecommendError::EmptyRoster("hospitals"))?;
        let breakdown = self
            .timing
            .breakdown(to_patient.duration_min, to_hospital.duration_min);
        Ok(DerivedFeatures {
            base,
            to_patient,
            closest_hospital,
            to_hospital,
            breakdown,
        })
    }

    pub fn recommend_for_location(
        &self,
        location: GeoPoint,
        severity: &str,
        condition: &str,
    ) -> Result<Recommendation<'_>, RecommendError> {
        let features = self.derive_features(location)?;
        let hospital_id = self.recommend(
            location,
            severity,
            condition,
            features.distance_to_hospital_km(),
            features.response_time_min(),
        )?;
        let hospital = self
            .hospitals
            .iter()
            .find(|h| h.id == hospital_id)
            .ok_or(RecommendError::UnknownHospital(hospital_id))?;
        Ok(Recommendation { hospital, features })
    }
}

/// First item at minimum distance from `location`.
fn closest<'a, T>(
    items: &'a [T],
    location: GeoPoint,
    geo: &GeoDistance,
    position: impl Fn(&T) -> GeoPoint,
) -> Option<(&'a T, TravelEstimate)> {
    let mut best: Option<(&'a T, TravelEstimate)> = None;
    for item in items {
        let leg = geo.distance_and_time(position(item), location);
        if best.map_or(true, |(_, b)| leg.distance_km < b.distance_km) {
            best = Some((item, leg));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::haversine_km;

    fn hospital(id: HospitalId, lat: f64, lon: f64) -> Hospital {
        Hospital {
            id,
            name: format!("Hospital {id}"),
            address: String::new(),
            location: GeoPoint::new(lat, lon),
            level: 3,
            has_er: true,
        }
    }

    fn base() -> EmsBase {
        EmsBase {
            base_id: 163,
            base_name: "Test Base".to_string(),
            location: GeoPoint::new(14.64, 121.10),
            ambulances: 1,
        }
    }

    /// South of 14.64 goes to hospital 1, north to hospital 2.
    fn examples() -> Vec<TrainingExample> {
        let mut out = Vec::new();
        for i in 0..40 {
            let lat = 14.60 + 0.002 * i as f64;
            for (j, (severity, condition)) in
                [("high", "Stroke"), ("low", "Fever"), ("medium", "Fracture")].iter().enumerate()
            {
                let lon = 121.08 + 0.01 * j as f64;
                out.push(TrainingExample {
                    location: GeoPoint::new(lat, lon),
                    severity: severity.to_string(),
                    condition: condition.to_string(),
                    distance_to_hospital_km: 1.0,
                    response_time_min: 25.0,
                    hospital_id: if lat < 14.64 { 1 } else { 2 },
                });
            }
        }
        out
    }

    fn recommender() -> HospitalRecommender {
        let forest = RandomForest::new(ForestConfig {
            n_estimators: 20,
            max_features: MaxFeatures::All,
            ..Default::default()
        });
        let model = HospitalModel::fit(&examples(), forest).unwrap();
        HospitalRecommender::new(
            model,
            vec![base()],
            vec![hospital(1, 14.61, 121.09), hospital(2, 14.67, 121.11)],
            GeoDistance::default(),
        )
    }

    #[test]
    fn encoders_are_fitted_on_training_vocabulary() {
        let rec = recommender();
        assert_eq!(rec.model().severity_encoder().classes(), ["high", "low", "medium"]);
        assert_eq!(
            rec.model().condition_encoder().classes(),
            ["Fever", "Fracture", "Stroke"]
        );
    }

    #[test]
    fn recommends_by_learned_region() {
        let rec = recommender();
        let south = rec
            .recommend_for_location(GeoPoint::new(14.605, 121.09), "high", "Stroke")
            .unwrap();
        assert_eq!(south.hospital.id, 1);
        let north = rec
            .recommend_for_location(GeoPoint::new(14.675, 121.09), "low", "Fever")
            .unwrap();
        assert_eq!(north.hospital.id, 2);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let rec = recommender();
        let err = rec
            .recommend(GeoPoint::new(14.62, 121.1), "critical", "Stroke", 1.0, 20.0)
            .unwrap_err();
        assert!(matches!(
            err,
            RecommendError::UnknownCategory { ref field, .. } if field == "severity"
        ));
        let err = rec
            .recommend(GeoPoint::new(14.62, 121.1), "high", "Sprain", 1.0, 20.0)
            .unwrap_err();
        assert!(matches!(
            err,
            RecommendError::UnknownCategory { ref field, .. } if field == "condition"
        ));
    }

    #[test]
    fn derived_response_uses_full_timing() {
        let rec = recommender();
        let location = GeoPoint::new(14.62, 121.10);
        let features = rec.derive_features(location).unwrap();
        assert_eq!(features.closest_hospital.id, 1);
        let to_patient = haversine_km(base().location, location) / 30.0 * 60.0;
        let to_hospital = haversine_km(GeoPoint::new(14.61, 121.09), location) / 30.0 * 60.0;
        let expected = 2.0 + to_patient + 10.0 + to_hospital + 5.0;
        assert!((features.response_time_min() - expected).abs() < 1e-9);
    }

    #[test]
    fn empty_roster_is_an_error() {
        let model = recommender().model;
        let rec = HospitalRecommender::new(model, Vec::new(), Vec::new(), GeoDistance::default());
        assert!(matches!(
            rec.derive_features(GeoPoint::new(14.62, 121.1)),
            Err(RecommendError::EmptyRoster(_))
        ));
    }

    #[test]
    fn records_without_hospital_have_no_label() {
        use crate::simulation::DispatchRecord;
        let json = serde_json::json!({
            "incident_id": 1,
            "location": {"lat": 14.62, "lon": 121.1},
            "severity": "medium",
            "condition": "Fracture",
            "call_time_ms": 0,
            "call_time": "2025-05-13T08:00:00",
            "queue_delay_min": 0.0,
            "unit_id": 1,
            "base_id": 163,
            "base_name": "Test Base",
            "distance_to_patient_km": 1.0,
            "hospital": null,
            "breakdown": {
                "dispatch_min": 2.0, "to_patient_min": 2.0, "on_scene_min": 10.0,
                "to_hospital_min": 0.0, "handover_min": 5.0
            },
            "total_response_min": 19.0,
            "is_estimated": true
        });
        let record: DispatchRecord = serde_json::from_value(json).unwrap();
        assert!(TrainingExample::from_record(&record).is_none());
    }
}
