//! ML модели: регрессоры, метрики и выбор лучшей модели

#![allow(non_snake_case)]

pub mod forest;
pub mod linear;
pub mod metrics;
pub mod selection;
pub mod tree;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Algorithm;

pub use forest::RandomForestRegressor;
pub use linear::LinearRegression;
pub use selection::{ModelSelector, SelectionConfig};
pub use tree::RegressionTree;

pub trait Regressor {
    fn algorithm(&self) -> Algorithm;

    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>>;

    /// Важность признаков, если алгоритм её даёт
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Обученная модель, которой владеет результат выбора
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedModel {
    Linear(LinearRegression),
    RandomForest(RandomForestRegressor),
}

impl FittedModel {
    fn inner(&self) -> &dyn Regressor {
        match self {
            FittedModel::Linear(m) => m,
            FittedModel::RandomForest(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            FittedModel::Linear(m) => m,
            FittedModel::RandomForest(m) => m,
        }
    }
}

impl Regressor for FittedModel {
    fn algorithm(&self) -> Algorithm {
        self.inner().algorithm()
    }

    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(X, y)
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(X)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.inner().feature_importances()
    }
}

impl From<LinearRegression> for FittedModel {
    fn from(model: LinearRegression) -> Self {
        FittedModel::Linear(model)
    }
}

impl From<RandomForestRegressor> for FittedModel {
    fn from(model: RandomForestRegressor) -> Self {
        FittedModel::RandomForest(model)
    }
}
