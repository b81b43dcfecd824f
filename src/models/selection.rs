//! Обучение нескольких регрессоров и выбор лучшего по RMSE

#![allow(non_snake_case)]

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::metrics::evaluate;
use super::{FittedModel, LinearRegression, RandomForestRegressor, Regressor};
use crate::error::{BiError, Result};
use crate::frame::{column_type, datetime_values, f64_values};
use crate::types::{Algorithm, ColumnType, ModelRun, RegressionMetrics, SelectionResult};

pub const DEFAULT_SPLIT_RATIO: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_N_ESTIMATORS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Доля строк в тестовой выборке
    pub split_ratio: f64,
    pub seed: u64,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// При равном RMSE побеждает ансамбль
    pub ensemble_wins_ties: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            split_ratio: DEFAULT_SPLIT_RATIO,
            seed: DEFAULT_SEED,
            n_estimators: DEFAULT_N_ESTIMATORS,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            ensemble_wins_ties: true,
        }
    }
}

/// Разбиение строк на train/test
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Перемешивание с фиксированным зерном; первые `floor(n * ratio)` индексов - тест
pub fn train_test_split(n_rows: usize, split_ratio: f64, seed: u64) -> Result<TrainTestSplit> {
    let ratio = if split_ratio.is_finite() { split_ratio.clamp(0.0, 1.0) } else { 0.0 };
    let n_test = ((n_rows as f64 * ratio) + 1e-9).floor() as usize;
    let n_test = n_test.min(n_rows);
    let n_train = n_rows - n_test;

    if n_test == 0 || n_train == 0 {
        return Err(BiError::InsufficientData(format!(
            "{} rows cannot be split into non-empty train and test partitions at ratio {}",
            n_rows, split_ratio
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(TrainTestSplit { train, test: indices })
}

/// Правило выбора: меньший RMSE, ничья - по политике
pub fn select_winner(linear: &RegressionMetrics, ensemble: &RegressionMetrics, ensemble_wins_ties: bool) -> Algorithm {
    if ensemble.rmse < linear.rmse || (ensemble.rmse == linear.rmse && ensemble_wins_ties) {
        Algorithm::RandomForest
    } else {
        Algorithm::LinearRegression
    }
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    config: SelectionConfig,
}

impl ModelSelector {
    pub fn new() -> Self {
        Self {
            config: SelectionConfig::default(),
        }
    }

    pub fn with_config(config: SelectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn train_and_compare<S: AsRef<str>>(&self, table: &DataFrame, target: &str, features: &[S]) -> Result<SelectionResult> {
        let feature_names: Vec<String> = features.iter().map(|f| f.as_ref().to_string()).collect();
        let (X, y) = Self::extract_matrix(table, target, &feature_names)?;

        let split = train_test_split(X.nrows(), self.config.split_ratio, self.config.seed)?;
        let X_train = X.select(Axis(0), &split.train);
        let y_train = y.select(Axis(0), &split.train);
        let X_test = X.select(Axis(0), &split.test);
        let y_test = y.select(Axis(0), &split.test);

        tracing::info!(
            "Training models for '{}' on {} features: {} train / {} test rows",
            target,
            feature_names.len(),
            split.train.len(),
            split.test.len()
        );

        // Модели не делят состояние: каждая обучается на своей копии параметров
        let mut linear = LinearRegression::new();
        linear.fit(&X_train, &y_train)?;

        let mut forest = RandomForestRegressor::new(self.config.n_estimators)
            .with_max_depth(self.config.max_depth)
            .with_min_samples_split(self.config.min_samples_split)
            .with_min_samples_leaf(self.config.min_samples_leaf)
            .with_random_state(self.config.seed);
        forest.fit(&X_train, &y_train)?;

        let runs = vec![
            Self::evaluate_run(linear.into(), &X_test, &y_test, &feature_names)?,
            Self::evaluate_run(forest.into(), &X_test, &y_test, &feature_names)?,
        ];

        let winner = select_winner(&runs[0].metrics, &runs[1].metrics, self.config.ensemble_wins_ties);
        let best_index = if winner == Algorithm::LinearRegression { 0 } else { 1 };

        for run in &runs {
            tracing::info!(
                "{}: MAE {:.4}, RMSE {:.4}, R2 {:.4}",
                run.algorithm,
                run.metrics.mae,
                run.metrics.rmse,
                run.metrics.r2
            );
        }
        tracing::info!("Best model: {}", winner);

        let results: BTreeMap<String, RegressionMetrics> = runs
            .iter()
            .map(|r| (r.algorithm.name().to_string(), r.metrics))
            .collect();
        let importances = runs[best_index].feature_importances.clone();

        Ok(SelectionResult {
            target: target.to_string(),
            features: feature_names,
            results,
            best_model_name: winner,
            importances,
            runs,
            best_index,
        })
    }

    fn evaluate_run(model: FittedModel, X_test: &Array2<f64>, y_test: &Array1<f64>, feature_names: &[String]) -> Result<ModelRun> {
        let predictions = model.predict(X_test)?;
        let metrics = evaluate(y_test, &predictions)?;

        let feature_importances = model.feature_importances().map(|imp| {
            feature_names
                .iter()
                .cloned()
                .zip(imp.iter().map(|v| v.max(0.0)))
                .collect::<BTreeMap<String, f64>>()
        });

        Ok(ModelRun {
            algorithm: model.algorithm(),
            metrics,
            feature_importances,
            model,
        })
    }

    /// Матрица признаков и вектор цели; даты кодируются секундами Unix
    fn extract_matrix(table: &DataFrame, target: &str, features: &[String]) -> Result<(Array2<f64>, Array1<f64>)> {
        if features.is_empty() {
            return Err(BiError::invalid_column("<features>", "no feature columns selected"));
        }
        if features.iter().any(|f| f == target) {
            return Err(BiError::invalid_column(target, "target cannot also be a feature"));
        }

        let target_column = table
            .column(target)
            .map_err(|_| BiError::invalid_column(target, "not found in table"))?;
        if column_type(target_column) != ColumnType::Numeric {
            return Err(BiError::invalid_column(target, "target column must be numeric"));
        }

        let y = f64_values(target_column)?
            .into_iter()
            .map(|v| v.ok_or_else(|| BiError::invalid_column(target, "contains missing or non-numeric values")))
            .collect::<Result<Array1<f64>>>()?;

        let mut X = Array2::zeros((table.height(), features.len()));
        for (j, name) in features.iter().enumerate() {
            let column = table
                .column(name)
                .map_err(|_| BiError::invalid_column(name, "not found in table"))?;

            let values: Vec<Option<f64>> = match column_type(column) {
                ColumnType::Numeric => f64_values(column)?,
                ColumnType::DateTime => datetime_values(column)?
                    .into_iter()
                    .map(|v| v.map(|dt| dt.and_utc().timestamp() as f64))
                    .collect(),
                _ => return Err(BiError::invalid_column(name, "feature must be numeric or datetime")),
            };

            for (i, value) in values.into_iter().enumerate() {
                X[[i, j]] = value.ok_or_else(|| BiError::invalid_column(name, "contains missing or non-numeric values"))?;
            }
        }

        Ok((X, y))
    }
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::datetime_column;
    use chrono::{Duration, NaiveDate};
    use polars::prelude::*;

    fn noisy_table(n: usize) -> DataFrame {
        let x1: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let x2: Vec<f64> = (0..n).map(|i| ((i * 7) % 5) as f64).collect();
        let y: Vec<f64> = (0..n).map(|i| if i % 10 < 5 { 3.0 * x2[i] } else { 50.0 + x1[i] }).collect();
        df!("x1" => x1, "x2" => x2, "y" => y).unwrap()
    }

    fn series(n: usize, f: impl Fn(usize) -> f64) -> Vec<f64> {
        (0..n).map(f).collect()
    }

    #[test]
    fn test_split_sizes() {
        let split = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);

        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_seeded() {
        assert_eq!(train_test_split(50, 0.2, 42).unwrap(), train_test_split(50, 0.2, 42).unwrap());
    }

    #[test]
    fn test_three_rows_is_insufficient() {
        assert!(matches!(train_test_split(3, 0.2, 42), Err(BiError::InsufficientData(_))));
        assert!(matches!(train_test_split(10, 1.0, 42), Err(BiError::InsufficientData(_))));
    }

    #[test]
    fn test_select_winner_rules() {
        let low = RegressionMetrics { mae: 1.0, rmse: 1.0, r2: 0.9 };
        let high = RegressionMetrics { mae: 2.0, rmse: 2.0, r2: 0.5 };

        assert_eq!(select_winner(&low, &high, true), Algorithm::LinearRegression);
        assert_eq!(select_winner(&high, &low, true), Algorithm::RandomForest);
        assert_eq!(select_winner(&low, &low, true), Algorithm::RandomForest);
        assert_eq!(select_winner(&low, &low, false), Algorithm::LinearRegression);
    }

    #[test]
    fn test_reproducible_metrics() {
        let table = noisy_table(60);
        let selector = ModelSelector::new();

        let a = selector.train_and_compare(&table, "y", &["x1", "x2"]).unwrap();
        let b = selector.train_and_compare(&table, "y", &["x1", "x2"]).unwrap();

        assert_eq!(a.results, b.results);
        assert_eq!(a.best_model_name, b.best_model_name);
        assert_eq!(a.importances, b.importances);
    }

    #[test]
    fn test_tie_goes_to_ensemble() {
        let n = 20;
        let table = df!("x" => series(n, |i| i as f64), "y" => series(n, |_| 5.0)).unwrap();

        let result = ModelSelector::new().train_and_compare(&table, "y", &["x"]).unwrap();

        let linear = result.results["Linear Regression"];
        let forest = result.results["Random Forest"];
        assert_eq!(linear.rmse, forest.rmse);
        assert_eq!(result.best_model_name, Algorithm::RandomForest);
        assert!(matches!(result.best_model(), FittedModel::RandomForest(_)));
    }

    #[test]
    fn test_linear_wins_on_linear_data() {
        let n = 30;
        let table = df!("x" => series(n, |i| i as f64), "y" => series(n, |i| 2.0 * i as f64 + 1.0)).unwrap();

        let result = ModelSelector::new().train_and_compare(&table, "y", &["x"]).unwrap();
        assert_eq!(result.best_model_name, Algorithm::LinearRegression);
        assert!(result.importances.is_none());

        // важности леса доступны через его прогон
        let forest = result.run(Algorithm::RandomForest).unwrap();
        assert!(forest.feature_importances.is_some());

        let model = result.into_best_model();
        let pred = model.predict(&ndarray::array![[100.0]]).unwrap();
        assert!((pred[0] - 201.0).abs() < 1e-6);
    }

    #[test]
    fn test_ensemble_importances_cover_features() {
        let table = noisy_table(80);
        let result = ModelSelector::new().train_and_compare(&table, "y", &["x1", "x2"]).unwrap();

        let forest = result.run(Algorithm::RandomForest).unwrap();
        let imp = forest.feature_importances.as_ref().unwrap();
        assert_eq!(imp.len(), 2);
        assert!(imp.values().all(|&v| v >= 0.0));
        assert!((imp.values().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_columns() {
        let labels: Vec<String> = (0..10).map(|i| format!("c{}", i)).collect();
        let table = df!("x" => series(10, |i| i as f64), "label" => labels, "y" => series(10, |i| i as f64)).unwrap();
        let selector = ModelSelector::new();

        let missing = selector.train_and_compare(&table, "y", &["nope"]).unwrap_err();
        assert!(matches!(missing, BiError::InvalidColumn { ref column, .. } if column == "nope"));

        let text_target = selector.train_and_compare(&table, "label", &["x"]).unwrap_err();
        assert!(matches!(text_target, BiError::InvalidColumn { .. }));

        let text_feature = selector.train_and_compare(&table, "y", &["label"]).unwrap_err();
        assert!(matches!(text_feature, BiError::InvalidColumn { .. }));

        let no_target = selector.train_and_compare(&table, "revenue", &["x"]).unwrap_err();
        assert!(matches!(no_target, BiError::InvalidColumn { .. }));

        let empty: [&str; 0] = [];
        assert!(selector.train_and_compare(&table, "y", &empty).is_err());
    }

    #[test]
    fn test_three_row_table_is_insufficient() {
        let table = df!("x" => [1.0, 2.0, 3.0], "y" => [2.0, 4.0, 6.0]).unwrap();

        let err = ModelSelector::new().train_and_compare(&table, "y", &["x"]).unwrap_err();
        assert!(matches!(err, BiError::InsufficientData(_)));
    }

    #[test]
    fn test_datetime_feature_does_not_hide_small_scale_feature() {
        // ежедневные заказы: секунды Unix на порядки крупнее количества
        let n = 100;
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let dates: Vec<Option<chrono::NaiveDateTime>> = (0..n).map(|i| Some(start + Duration::days(i as i64))).collect();
        let quantity = series(n, |i| (i % 10 + 1) as f64);
        let total: Vec<f64> = quantity.iter().map(|q| 5.0 * q + 2.0).collect();

        let table = DataFrame::new(vec![
            datetime_column("OrderDate", &dates).unwrap(),
            Column::from(Series::new("Quantity".into(), quantity)),
            Column::from(Series::new("TotalPrice".into(), total)),
        ])
        .unwrap();

        let result = ModelSelector::new()
            .train_and_compare(&table, "TotalPrice", &["OrderDate", "Quantity"])
            .unwrap();

        let linear = result.results["Linear Regression"];
        assert!(linear.r2 > 0.999, "linear R2 = {}", linear.r2);
        assert!(linear.rmse < 1e-4, "linear RMSE = {}", linear.rmse);
        assert_eq!(result.runs().len(), 2);
    }
}
