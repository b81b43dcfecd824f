//! Дерево решений для регрессии (CART, критерий MSE)

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{BiError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    /// Число признаков, перебираемых в каждом узле (None - все)
    max_features: Option<usize>,
    root: Option<TreeNode>,
    /// Суммарное уменьшение SSE по признакам
    impurity_decrease: Vec<f64>,
}

impl RegressionTree {
    pub fn new(max_depth: Option<usize>, min_samples_split: usize, min_samples_leaf: usize) -> Self {
        Self {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            min_samples_leaf: min_samples_leaf.max(1),
            max_features: None,
            root: None,
            impurity_decrease: Vec::new(),
        }
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let indices: Vec<usize> = (0..X.nrows()).collect();
        let mut rng = StdRng::seed_from_u64(0);
        self.fit_sample(X, y, indices, &mut rng)
    }

    /// Обучение на подвыборке строк (индексы могут повторяться - бутстрэп)
    pub fn fit_sample(&mut self, X: &Array2<f64>, y: &Array1<f64>, indices: Vec<usize>, rng: &mut StdRng) -> Result<()> {
        if X.nrows() == 0 || indices.is_empty() {
            return Err(BiError::Training("Empty dataset".to_string()));
        }
        if y.len() != X.nrows() {
            return Err(BiError::Training("Target length does not match features".to_string()));
        }

        self.impurity_decrease = vec![0.0; X.ncols()];
        self.root = Some(self.build_tree(X, y, 0, indices, rng));
        Ok(())
    }

    fn build_tree(&mut self, X: &Array2<f64>, y: &Array1<f64>, depth: usize, indices: Vec<usize>, rng: &mut StdRng) -> TreeNode {
        let n = indices.len();
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / n as f64;
        let parent_sse: f64 = indices.iter().map(|&i| (y[i] - mean).powi(2)).sum();

        let depth_reached = self.max_depth.map_or(false, |d| depth >= d);
        if depth_reached || n < self.min_samples_split || n < 2 * self.min_samples_leaf || parent_sse <= 1e-12 {
            return TreeNode::Leaf { value: mean };
        }

        let split = match self.find_best_split(X, y, &indices, mean, rng) {
            Some(split) if parent_sse - split.sse > 1e-12 => split,
            _ => return TreeNode::Leaf { value: mean },
        };

        self.impurity_decrease[split.feature] += parent_sse - split.sse;

        TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build_tree(X, y, depth + 1, split.left, rng)),
            right: Box::new(self.build_tree(X, y, depth + 1, split.right, rng)),
        }
    }

    fn candidate_features(&self, n_features: usize, rng: &mut StdRng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < n_features => {
                let mut features = rand::seq::index::sample(rng, n_features, k.max(1)).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..n_features).collect(),
        }
    }

    /// Перебор всех порогов между соседними различными значениями
    fn find_best_split(&self, X: &Array2<f64>, y: &Array1<f64>, indices: &[usize], mean: f64, rng: &mut StdRng) -> Option<BestSplit> {
        let n = indices.len();
        let mut best: Option<(usize, f64, f64, Vec<usize>, usize)> = None;

        for feature in self.candidate_features(X.ncols(), rng) {
            let mut sorted = indices.to_vec();
            sorted.sort_by(|&a, &b| X[[a, feature]].total_cmp(&X[[b, feature]]));

            // отклонения от среднего узла, чтобы не терять точность
            let total_sum: f64 = sorted.iter().map(|&i| y[i] - mean).sum();
            let total_sq: f64 = sorted.iter().map(|&i| (y[i] - mean).powi(2)).sum();

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..n - 1 {
                let d = y[sorted[pos]] - mean;
                left_sum += d;
                left_sq += d * d;

                let left_n = pos + 1;
                let right_n = n - left_n;
                if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                    continue;
                }

                let current = X[[sorted[pos], feature]];
                let next = X[[sorted[pos + 1], feature]];
                if current >= next {
                    continue;
                }

                let left_sse = (left_sq - left_sum * left_sum / left_n as f64).max(0.0);
                let right_sum = total_sum - left_sum;
                let right_sse = ((total_sq - left_sq) - right_sum * right_sum / right_n as f64).max(0.0);
                let sse = left_sse + right_sse;

                if best.as_ref().map_or(true, |b| sse < b.2) {
                    let mut threshold = (current + next) / 2.0;
                    if threshold >= next {
                        threshold = current;
                    }
                    best = Some((feature, threshold, sse, sorted.clone(), left_n));
                }
            }
        }

        best.map(|(feature, threshold, sse, sorted, left_n)| {
            let right = sorted[left_n..].to_vec();
            let mut left = sorted;
            left.truncate(left_n);
            BestSplit {
                feature,
                threshold,
                sse,
                left,
                right,
            }
        })
    }

    pub fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| BiError::Training("Model not trained".to_string()))?;

        if X.ncols() != self.impurity_decrease.len() {
            return Err(BiError::Training(format!(
                "Expected {} features, got {}",
                self.impurity_decrease.len(),
                X.ncols()
            )));
        }

        Ok(X.rows().into_iter().map(|row| Self::predict_single(root, row)).collect())
    }

    fn predict_single(node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
        match node {
            TreeNode::Leaf { value } => *value,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    Self::predict_single(left, sample)
                } else {
                    Self::predict_single(right, sample)
                }
            }
        }
    }

    /// Нормированная важность признаков (сумма 1, если было хотя бы одно разбиение)
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.root.as_ref()?;
        let total: f64 = self.impurity_decrease.iter().sum();
        let importances = if total > 0.0 {
            self.impurity_decrease.iter().map(|v| v / total).collect()
        } else {
            Array1::zeros(self.impurity_decrease.len())
        };
        Some(importances)
    }

    pub fn depth(&self) -> usize {
        fn depth_of(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        self.root.as_ref().map(depth_of).unwrap_or(0)
    }
}
