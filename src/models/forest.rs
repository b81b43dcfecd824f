//! Случайный лес для регрессии (бэггинг деревьев)

#![allow(non_snake_case)]

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::RegressionTree;
use super::Regressor;
use crate::error::{BiError, Result};
use crate::types::Algorithm;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Признаков на узел (None - все, как в sklearn для регрессии)
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub random_state: u64,
    trees: Vec<RegressionTree>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            random_state: 42,
            trees: Vec::new(),
            feature_importances: None,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn compute_feature_importances(&mut self) {
        let mut total_importances = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (i, &val) in imp.iter().enumerate() {
                    total_importances[i] += val;
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        for imp in &mut total_importances {
            *imp /= n_trees;
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }
}

impl Regressor for RandomForestRegressor {
    fn algorithm(&self) -> Algorithm {
        Algorithm::RandomForest
    }

    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = X.nrows();
        if n_samples == 0 || X.ncols() == 0 {
            return Err(BiError::Training("Empty dataset".to_string()));
        }
        if y.len() != n_samples {
            return Err(BiError::Training(format!(
                "Target has {} values, features have {} rows",
                y.len(),
                n_samples
            )));
        }

        self.n_features = X.ncols();

        // Каждое дерево получает своё зерно из общего генератора
        let mut rng = StdRng::seed_from_u64(self.random_state);
        let mut trees = Vec::with_capacity(self.n_estimators);
        for _ in 0..self.n_estimators {
            let mut tree_rng = StdRng::seed_from_u64(rng.gen::<u64>());

            let indices: Vec<usize> = if self.bootstrap {
                (0..n_samples).map(|_| tree_rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            let mut tree = RegressionTree::new(self.max_depth, self.min_samples_split, self.min_samples_leaf)
                .with_max_features(self.max_features);
            tree.fit_sample(X, y, indices, &mut tree_rng)?;
            trees.push(tree);
        }

        self.trees = trees;
        self.compute_feature_importances();

        tracing::debug!("Random forest fitted: {} trees on {} samples", self.trees.len(), n_samples);
        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(BiError::Training("Model not trained".to_string()));
        }

        let mut sum: Array1<f64> = Array1::zeros(X.nrows());
        for tree in &self.trees {
            sum += &tree.predict(X)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}
