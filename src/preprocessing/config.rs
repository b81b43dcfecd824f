//! Конфигурация нормализации таблиц

use serde::{Deserialize, Serialize};

/// Доля успешно разобранных дат, при которой колонка становится DateTime
pub const DEFAULT_DATE_PROMOTION_THRESHOLD: f64 = 0.8;

/// Метка для категориальной колонки без моды
pub const DEFAULT_FILL_LABEL: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Минимальная доля непустых разобранных дат среди всех значений колонки
    pub date_promotion_threshold: f64,

    /// Значение для категориальной колонки, у которой нет моды
    pub fill_label: String,

    /// Строки, которые при чтении считаются пропуском
    pub missing_markers: Vec<String>,

    /// Форматы даты со временем (chrono)
    pub datetime_formats: Vec<String>,

    /// Форматы даты без времени (chrono)
    pub date_formats: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            date_promotion_threshold: DEFAULT_DATE_PROMOTION_THRESHOLD,
            fill_label: DEFAULT_FILL_LABEL.to_string(),
            missing_markers: ["", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "#N/A", "<NA>"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            datetime_formats: [
                "%Y-%m-%d %H:%M:%S",
                "%Y-%m-%dT%H:%M:%S",
                "%Y-%m-%d %H:%M:%S%.f",
                "%Y-%m-%dT%H:%M:%S%.f",
                "%Y-%m-%d %H:%M",
                "%Y/%m/%d %H:%M:%S",
                "%m/%d/%Y %H:%M:%S",
                "%m/%d/%Y %H:%M",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            date_formats: [
                "%Y-%m-%d",
                "%Y/%m/%d",
                "%m/%d/%Y",
                "%d.%m.%Y",
                "%d-%b-%Y",
                "%d %b %Y",
                "%b %d, %Y",
                "%B %d, %Y",
                "%d %B %Y",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl NormalizerConfig {
    pub fn with_date_threshold(mut self, threshold: f64) -> Self {
        self.date_promotion_threshold = threshold;
        self
    }

    pub fn with_fill_label(mut self, label: impl Into<String>) -> Self {
        self.fill_label = label.into();
        self
    }

    pub fn is_missing_marker(&self, value: &str) -> bool {
        self.missing_markers.iter().any(|m| m == value)
    }
}
