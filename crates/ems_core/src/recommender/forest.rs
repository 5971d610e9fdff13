//! Random forest of CART decision trees (Gini impurity, bootstrap sampling,
//! random feature subsets per split). Leaves store class distributions and the
//! forest predicts the class with the highest mean probability.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::classifier::{
    check_training_set, ClassifierError, FeatureRow, HospitalClassifier, NUM_FEATURES,
};
use crate::hospital::HospitalId;

/// Number of features examined per split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    All,
    Sqrt,
    Fixed(usize),
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt() as usize).max(1),
            MaxFeatures::Fixed(k) => (*k).clamp(1, n_features),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn distribution(&self, row: &FeatureRow) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

fn gini_from_sumsq(sumsq: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - sumsq / (n * n)
}

struct Split {
    feature: usize,
    threshold: f64,
    /// Weighted impurity decrease: `n * parent - n_l * left - n_r * right`.
    decrease: f64,
}

struct TreeBuilder<'a> {
    rows: &'a [FeatureRow],
    labels: &'a [usize],
    n_classes: usize,
    config: &'a ForestConfig,
    max_features: usize,
    importances: [f64; NUM_FEATURES],
}

impl<'a> TreeBuilder<'a> {
    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &s in samples {
            counts[self.labels[s]] += 1;
        }
        counts
    }

    fn best_split(&self, samples: &[usize], counts: &[usize], rng: &mut StdRng) -> Option<Split> {
        let min_leaf = self.config.min_samples_leaf.max(1);
        let n = samples.len();
        let parent_sumsq: f64 = counts.iter().map(|&c| (c * c) as f64).sum();
        let parent_gini = gini_from_sumsq(parent_sumsq, n);

        let mut features: Vec<usize> = (0..NUM_FEATURES).collect();
        features.shuffle(rng);

        let mut sorted = samples.to_vec();
        let mut visited = 0;
        let mut best: Option<(usize, f64, f64)> = None;
        for feature in features {
            if visited >= self.max_features {
                break;
            }
            sorted.sort_by(|&a, &b| self.rows[a][feature].total_cmp(&self.rows[b][feature]));
            let lo = self.rows[sorted[0]][feature];
            let hi = self.rows[sorted[n - 1]][feature];
            // Constant features do not count towards max_features.
            if lo == hi {
                continue;
            }
            visited += 1;

            let mut left = vec![0usize; self.n_classes];
            let mut right = counts.to_vec();
            let mut sumsq_l = 0.0;
            let mut sumsq_r = parent_sumsq;
            for i in 0..n - 1 {
                let k = self.labels[sorted[i]];
                sumsq_l += (2 * left[k] + 1) as f64;
                left[k] += 1;
                sumsq_r -= (2 * right[k] - 1) as f64;
                right[k] -= 1;

                let n_l = i + 1;
                let n_r = n - n_l;
                if n_l < min_leaf || n_r < min_leaf {
                    continue;
                }
                let value = self.rows[sorted[i]][feature];
                let next = self.rows[sorted[i + 1]][feature];
                if value == next {
                    continue;
                }
                let weighted = (n_l as f64 * gini_from_sumsq(sumsq_l, n_l)
                    + n_r as f64 * gini_from_sumsq(sumsq_r, n_r))
                    / n as f64;
                if best.map_or(true, |(_, _, b)| weighted < b) {
                    let mut threshold = value / 2.0 + next / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some((feature, threshold, weighted));
                }
            }
        }

        best.map(|(feature, threshold, weighted)| Split {
            feature,
            threshold,
            decrease: n as f64 * (parent_gini - weighted),
        })
    }

    fn build(
        mut self,
        samples: Vec<usize>,
        rng: &mut StdRng,
    ) -> (DecisionTree, [f64; NUM_FEATURES]) {
        let placeholder = || Node::Leaf {
            distribution: Vec::new(),
        };
        let mut nodes = vec![placeholder()];
        let mut stack = vec![(0usize, samples, 0usize)];

        while let Some((idx, samples, depth)) = stack.pop() {
            let counts = self.class_counts(&samples);
            let n = samples.len();
            let impure = counts.iter().filter(|&&c| c > 0).count() > 1;
            let can_split = impure
                && n >= self.config.min_samples_split.max(2)
                && n >= 2 * self.config.min_samples_leaf.max(1)
                && self.config.max_depth.map_or(true, |d| depth < d);

            let split = if can_split {
                self.best_split(&samples, &counts, rng)
            } else {
                None
            };

            match split {
                Some(split) => {
                    self.importances[split.feature] += split.decrease;
                    let (left, right): (Vec<usize>, Vec<usize>) = samples
                        .into_iter()
                        .partition(|&s| self.rows[s][split.feature] <= split.threshold);
                    let left_idx = nodes.len();
                    nodes.push(placeholder());
                    let right_idx = nodes.len();
                    nodes.push(placeholder());
                    nodes[idx] = Node::Split {
                        feature: split.feature,
                        threshold: split.threshold,
                        left: left_idx,
                        right: right_idx,
                    };
                    stack.push((right_idx, right, depth + 1));
                    stack.push((left_idx, left, depth + 1));
                }
                None => {
                    let total = n.max(1) as f64;
                    nodes[idx] = Node::Leaf {
                        distribution: counts.iter().map(|&c| c as f64 / total).collect(),
                    };
                }
            }
        }

        (DecisionTree { nodes }, self.importances)
    }
}

fn normalize(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    classes: Vec<HospitalId>,
    trees: Vec<DecisionTree>,
    importances: Vec<f64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            trees: Vec::new(),
            importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn classes(&self) -> &[HospitalId] {
        &self.classes
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Mean impurity decrease per feature, normalized to sum to 1.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    /// Mean class probabilities over all trees, in [`Self::classes`] order.
    pub fn predict_proba(&self, row: &FeatureRow) -> Result<Vec<f64>, ClassifierError> {
        if !self.is_fitted() {
            return Err(ClassifierError::NotFitted);
        }
        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (p, d) in proba.iter_mut().zip(tree.distribution(row)) {
                *p += d;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        Ok(proba)
    }
}

impl HospitalClassifier for RandomForest {
    fn fit(&mut self, rows: &[FeatureRow], labels: &[HospitalId]) -> Result<(), ClassifierError> {
        check_training_set(rows, labels)?;
        if self.config.n_estimators == 0 {
            return Err(ClassifierError::InvalidConfig(
                "n_estimators must be positive".to_string(),
            ));
        }

        let mut classes = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        let encoded: Vec<usize> = labels
            .iter()
            .map(|l| classes.binary_search(l).unwrap_or(0))
            .collect();

        let n = rows.len();
        let max_features = self.config.max_features.resolve(NUM_FEATURES);
        let mut trees = Vec::with_capacity(self.config.n_estimators);
        let mut importances = vec![0.0; NUM_FEATURES];

        for t in 0..self.config.n_estimators {
            let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(t as u64));
            let samples: Vec<usize> = if self.config.bootstrap {
                (0..n).map(|_| rng.gen_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            let builder = TreeBuilder {
                rows,
                labels: &encoded,
                n_classes: classes.len(),
                config: &self.config,
                max_features,
                importances: [0.0; NUM_FEATURES],
            };
            let (tree, mut tree_importances) = builder.build(samples, &mut rng);
            normalize(&mut tree_importances);
            for (acc, v) in importances.iter_mut().zip(tree_importances) {
                *acc += v;
            }
            trees.push(tree);
        }
        normalize(&mut importances);

        self.classes = classes;
        self.trees = trees;
        self.importances = importances;
        Ok(())
    }

    fn predict(&self, row: &FeatureRow) -> Result<HospitalId, ClassifierError> {
        let proba = self.predict_proba(row)?;
        let mut best = 0;
        for (i, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = i;
            }
        }
        Ok(self.classes[best])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Label depends on latitude only; other columns are noise.
    fn separable(n: usize, seed: u64) -> (Vec<FeatureRow>, Vec<HospitalId>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for _ in 0..n {
            let lat = rng.gen_range(14.60..14.68);
            let row = [
                lat,
                rng.gen_range(121.07..121.13),
                rng.gen_range(0..3) as f64,
                rng.gen_range(0..9) as f64,
                rng.gen_range(0.0..5.0),
                rng.gen_range(20.0..40.0),
            ];
            rows.push(row);
            labels.push(if lat < 14.64 { 3 } else { 12 });
        }
        (rows, labels)
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_estimators: 15,
            ..Default::default()
        }
    }

    #[test]
    fn learns_a_separable_problem() {
        let (rows, labels) = separable(400, 1);
        let mut forest = RandomForest::new(small_config());
        forest.fit(&rows, &labels).unwrap();
        assert_eq!(forest.classes(), [3, 12]);

        let (test_rows, test_labels) = separable(200, 2);
        let predictions = forest.predict_batch(&test_rows).unwrap();
        let correct = predictions
            .iter()
            .zip(&test_labels)
            .filter(|(p, l)| p == l)
            .count();
        assert!(correct as f64 / 200.0 > 0.95, "accuracy {correct}/200");
    }

    #[test]
    fn latitude_dominates_importance() {
        let (rows, labels) = separable(400, 5);
        let mut forest = RandomForest::new(small_config());
        forest.fit(&rows, &labels).unwrap();
        let importances = forest.feature_importances();
        assert_eq!(importances.len(), NUM_FEATURES);
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        let top = importances
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(top, Some(0));
    }

    #[test]
    fn same_seed_same_forest() {
        let (rows, labels) = separable(150, 9);
        let mut a = RandomForest::new(small_config());
        let mut b = RandomForest::new(small_config());
        a.fit(&rows, &labels).unwrap();
        b.fit(&rows, &labels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_class_predicts_that_class() {
        let rows = vec![[14.6, 121.1, 0.0, 0.0, 1.0, 20.0]; 5];
        let mut forest = RandomForest::new(small_config());
        forest.fit(&rows, &[4; 5]).unwrap();
        assert_eq!(forest.predict(&rows[0]).unwrap(), 4);
    }

    #[test]
    fn unfitted_and_bad_input_errors() {
        let forest = RandomForest::default();
        assert_eq!(forest.predict(&[0.0; NUM_FEATURES]), Err(ClassifierError::NotFitted));

        let mut forest = RandomForest::default();
        assert_eq!(forest.fit(&[], &[]), Err(ClassifierError::EmptyTrainingSet));
        assert!(matches!(
            forest.fit(&[[0.0; NUM_FEATURES]], &[1, 2]),
            Err(ClassifierError::LengthMismatch { rows: 1, labels: 2 })
        ));
    }
}
