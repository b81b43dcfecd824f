//! Определение типа колонки пробным разбором дат

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::{Column, DataType};

use super::config::NormalizerConfig;
use crate::types::{ColumnType, ColumnTypeDecision};

/// Строгий разбор одной строки как даты по настроенным форматам
pub fn parse_datetime(value: &str, config: &NormalizerConfig) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    for fmt in &config.datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }

    for fmt in &config.date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Классификация колонки без побочных эффектов.
///
/// Для текстовой колонки кандидат всегда DateTime: он принимается, если ни одно
/// непустое значение не упало при разборе и доля разобранных дат среди всех
/// значений (включая пропуски) не меньше порога. Колонки уже известного типа
/// возвращаются как есть.
pub fn classify(column: &Column, config: &NormalizerConfig) -> ColumnTypeDecision {
    let total = column.len();
    let dtype = ColumnType::from_dtype(column.dtype());

    if dtype.is_resolved() {
        let present = total - column.null_count();
        return ColumnTypeDecision {
            column: column.name().to_string(),
            candidate: dtype,
            parsed_fraction: if total == 0 { 0.0 } else { present as f64 / total as f64 },
            accepted: true,
        };
    }

    let (parsed, failures) = match column.cast(&DataType::String) {
        Ok(texts) => match texts.str() {
            Ok(ca) => ca.into_iter().flatten().fold((0usize, 0usize), |(parsed, failures), value| {
                match parse_datetime(value, config) {
                    Some(_) => (parsed + 1, failures),
                    None => (parsed, failures + 1),
                }
            }),
            Err(_) => (0, total),
        },
        Err(_) => (0, total),
    };

    let parsed_fraction = if total == 0 { 0.0 } else { parsed as f64 / total as f64 };
    let required = config.date_promotion_threshold * total as f64;
    let accepted = total > 0 && failures == 0 && parsed as f64 >= required - 1e-9;

    ColumnTypeDecision {
        column: column.name().to_string(),
        candidate: ColumnType::DateTime,
        parsed_fraction,
        accepted,
    }
}
