/// Типы данных для BI ядра

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use polars::prelude::{DataFrame, DataType};
use serde::{Deserialize, Serialize, Serializer};

use crate::frame::table_view;
use crate::models::FittedModel;

/// Сырая таблица сразу после чтения файла
pub type RawTable = DataFrame;

/// Тип колонки. `Text` - неразобранный текст сырой таблицы (polars `String`),
/// `Categorical` - текст, окончательно признанный категориальным.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    DateTime,
    Text,
    Categorical,
}

impl ColumnType {
    pub fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Boolean => ColumnType::Numeric,
            DataType::Date | DataType::Datetime(_, _) => ColumnType::DateTime,
            DataType::Categorical(_, _) => ColumnType::Categorical,
            _ => ColumnType::Text,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, ColumnType::Text)
    }
}

/// Очищенная таблица. Создаётся только нормализатором.
#[derive(Debug, Clone)]
pub struct CleanTable(DataFrame);

impl CleanTable {
    pub(crate) fn from_normalized(table: DataFrame) -> Self {
        Self(table)
    }

    pub fn as_frame(&self) -> &DataFrame {
        &self.0
    }

    pub fn into_inner(self) -> DataFrame {
        self.0
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.0.column(name).ok().map(|c| ColumnType::from_dtype(c.dtype()))
    }

    pub fn total_missing(&self) -> usize {
        self.0.get_columns().iter().map(|c| c.null_count()).sum()
    }
}

impl Deref for CleanTable {
    type Target = DataFrame;

    fn deref(&self) -> &DataFrame {
        &self.0
    }
}

impl PartialEq for CleanTable {
    fn eq(&self, other: &Self) -> bool {
        self.0.equals_missing(&other.0)
    }
}

impl Serialize for CleanTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        table_view(&self.0)
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

/// Результат классификации одной колонки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTypeDecision {
    pub column: String,
    pub candidate: ColumnType,
    pub parsed_fraction: f64,
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    #[serde(rename = "MAE")]
    pub mae: f64,
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    #[serde(rename = "R2")]
    pub r2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "Linear Regression")]
    LinearRegression,
    #[serde(rename = "Random Forest")]
    RandomForest,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::LinearRegression => "Linear Regression",
            Algorithm::RandomForest => "Random Forest",
        }
    }

    pub fn is_ensemble(&self) -> bool {
        matches!(self, Algorithm::RandomForest)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Одна обученная модель на фиксированном разбиении
#[derive(Debug, Clone, Serialize)]
pub struct ModelRun {
    pub algorithm: Algorithm,
    pub metrics: RegressionMetrics,
    pub feature_importances: Option<BTreeMap<String, f64>>,
    #[serde(skip)]
    pub model: FittedModel,
}

/// Итог сравнения моделей. Победитель принадлежит вызывающему.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionResult {
    pub target: String,
    pub features: Vec<String>,
    pub results: BTreeMap<String, RegressionMetrics>,
    pub best_model_name: Algorithm,
    pub importances: Option<BTreeMap<String, f64>>,
    pub(crate) runs: Vec<ModelRun>,
    #[serde(skip)]
    pub(crate) best_index: usize,
}

impl SelectionResult {
    pub fn best_run(&self) -> &ModelRun {
        &self.runs[self.best_index]
    }

    pub fn best_model(&self) -> &FittedModel {
        &self.best_run().model
    }

    pub fn into_best_model(mut self) -> FittedModel {
        self.runs.swap_remove(self.best_index).model
    }

    /// Все обученные модели в порядке обучения
    pub fn runs(&self) -> &[ModelRun] {
        &self.runs
    }

    pub fn run(&self, algorithm: Algorithm) -> Option<&ModelRun> {
        self.runs.iter().find(|r| r.algorithm == algorithm)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRevenue {
    pub product: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub r#type: String, // "product_performance" | "improvement" | "monthly_trend" | "bundles" | "pricing"
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesInsightsOutput {
    pub product_revenue: Vec<ProductRevenue>,
    pub top_product: Option<ProductRevenue>,
    pub worst_product: Option<ProductRevenue>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub monthly_growth_percent: Option<f64>,
    pub suggestions: Vec<Suggestion>,
}
