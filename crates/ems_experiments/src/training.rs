//! Training pipeline for the hospital recommender: seeded 80/20 split, random
//! forest fit, accuracy, per-hospital precision/recall and feature importances.

use std::collections::BTreeSet;
use std::fmt;

use ems_core::hospital::HospitalId;
use ems_core::recommender::{
    ForestConfig, HospitalClassifier, HospitalModel, RandomForest, RecommendError,
    TrainingExample, FEATURE_NAMES,
};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::RecordRow;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub split_seed: u64,
    pub forest: ForestConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            split_seed: 42,
            forest: ForestConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("no labelled examples to train on")]
    NoExamples,
    #[error("test fraction must be within (0, 1), got {0}")]
    InvalidTestFraction(f64),
    #[error("{0} examples leave nothing to train on after the split")]
    TooFewExamples(usize),
    #[error(transparent)]
    Recommend(#[from] RecommendError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub hospital_id: HospitalId,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub train_size: usize,
    pub test_size: usize,
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    pub feature_importances: Vec<(String, f64)>,
}

/// Labelled examples from record rows; rows without a hospital are skipped.
pub fn examples_from_rows(rows: &[RecordRow]) -> Vec<TrainingExample> {
    let examples: Vec<TrainingExample> =
        rows.iter().filter_map(RecordRow::to_training_example).collect();
    let skipped = rows.len() - examples.len();
    if skipped > 0 {
        warn!("skipped {skipped} records without a destination hospital");
    }
    examples
}

/// Shuffle with `seed` and hold out `ceil(n * test_fraction)` items.
///
/// Returns `(train, test)`.
pub fn train_test_split<T: Clone>(items: &[T], test_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut indices: Vec<usize> = (0..items.len()).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_test = ((items.len() as f64 * test_fraction).ceil() as usize).min(items.len());
    let (test, train) = indices.split_at(n_test);
    (
        train.iter().map(|&i| items[i].clone()).collect(),
        test.iter().map(|&i| items[i].clone()).collect(),
    )
}

/// Per-class precision, recall and F1 over every label seen in either slice.
pub fn classification_report(truth: &[HospitalId], predicted: &[HospitalId]) -> Vec<ClassMetrics> {
    let classes: BTreeSet<HospitalId> = truth.iter().chain(predicted).copied().collect();
    classes
        .into_iter()
        .map(|class| {
            let true_positive = truth
                .iter()
                .zip(predicted)
                .filter(|(t, p)| **t == class && **p == class)
                .count();
            let predicted_count = predicted.iter().filter(|p| **p == class).count();
            let support = truth.iter().filter(|t| **t == class).count();
            let precision = ratio(true_positive, predicted_count);
            let recall = ratio(true_positive, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                hospital_id: class,
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect()
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Fit the encoders on every example, the forest on the training split, and
/// score the held-out split.
pub fn train_and_evaluate(
    examples: &[TrainingExample],
    config: &TrainingConfig,
) -> Result<(HospitalModel, EvaluationReport), TrainingError> {
    if examples.is_empty() {
        return Err(TrainingError::NoExamples);
    }
    if !(config.test_fraction > 0.0 && config.test_fraction < 1.0) {
        return Err(TrainingError::InvalidTestFraction(config.test_fraction));
    }
    let (train, test) = train_test_split(examples, config.test_fraction, config.split_seed);
    if train.is_empty() {
        return Err(TrainingError::TooFewExamples(examples.len()));
    }

    let mut model = HospitalModel::with_vocabulary(examples, RandomForest::new(config.forest));
    model.fit_classifier(&train)?;
    info!(
        "fitted {} trees on {} examples ({} held out)",
        config.forest.n_estimators,
        train.len(),
        test.len()
    );

    let rows = test
        .iter()
        .map(|e| model.encode_example(e))
        .collect::<Result<Vec<_>, _>>()?;
    let predicted = model
        .classifier()
        .predict_batch(&rows)
        .map_err(RecommendError::from)?;
    let truth: Vec<HospitalId> = test.iter().map(|e| e.hospital_id).collect();
    let correct = truth.iter().zip(&predicted).filter(|(t, p)| t == p).count();
    let accuracy = ratio(correct, truth.len());
    info!("held-out accuracy {accuracy:.4}");

    let feature_importances = FEATURE_NAMES
        .iter()
        .zip(model.classifier().feature_importances())
        .map(|(name, value)| (name.to_string(), *value))
        .collect();

    let report = EvaluationReport {
        train_size: train.len(),
        test_size: test.len(),
        accuracy,
        per_class: classification_report(&truth, &predicted),
        feature_importances,
    };
    Ok((model, report))
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Accuracy: {:.4} ({} train / {} test)",
            self.accuracy, self.train_size, self.test_size
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>10} {:>10} {:>10} {:>10} {:>10}",
            "hospital", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.per_class {
            writeln!(
                f,
                "{:>10} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                c.hospital_id, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Feature importance:")?;
        let mut ranked = self.feature_importances.clone();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (name, value) in ranked {
            writeln!(f, "  {name:<25} {value:.4}")?;
        }
        Ok(())
    }
}
