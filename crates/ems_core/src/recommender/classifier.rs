use thiserror::Error;

use crate::hospital::HospitalId;

/// Number of model inputs per example.
pub const NUM_FEATURES: usize = 6;

/// Column order of [`FeatureRow`].
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "latitude",
    "longitude",
    "severity",
    "condition",
    "distance_to_hospital_km",
    "response_time_min",
];

/// Encoded model input: location, category codes and the two derived figures.
pub type FeatureRow = [f64; NUM_FEATURES];

#[derive(Debug, Error, PartialEq)]
pub enum ClassifierError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("{rows} feature rows but {labels} labels")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("classifier has not been fitted")]
    NotFitted,
    #[error("invalid classifier configuration: {0}")]
    InvalidConfig(String),
}

/// Fit/predict capability behind the hospital recommender.
pub trait HospitalClassifier: Send + Sync {
    fn fit(&mut self, rows: &[FeatureRow], labels: &[HospitalId]) -> Result<(), ClassifierError>;

    fn predict(&self, row: &FeatureRow) -> Result<HospitalId, ClassifierError>;

    fn predict_batch(&self, rows: &[FeatureRow]) -> Result<Vec<HospitalId>, ClassifierError> {
        rows.iter().map(|row| self.predict(row)).collect()
    }
}

pub(crate) fn check_training_set(
    rows: &[FeatureRow],
    labels: &[HospitalId],
) -> Result<(), ClassifierError> {
    if rows.len() != labels.len() {
        return Err(ClassifierError::LengthMismatch {
            rows: rows.len(),
            labels: labels.len(),
        });
    }
    if rows.is_empty() {
        return Err(ClassifierError::EmptyTrainingSet);
    }
    Ok(())
}
