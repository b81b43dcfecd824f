//! Вспомогательные функции над polars DataFrame: типизированное чтение
//! колонок, сборка колонок из значений и JSON-представление таблицы

use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Timelike};
use polars::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::error::{BiError, Result};
use crate::types::ColumnType;

const DATETIME_UNIT: TimeUnit = TimeUnit::Milliseconds;

/// Значение ячейки до сборки колонки (файл или JSON)
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Missing,
    Number(f64),
    DateTime(NaiveDateTime),
    Text(String),
}

impl RawValue {
    fn is_missing(&self) -> bool {
        matches!(self, RawValue::Missing)
    }

    fn into_text(self) -> Option<String> {
        match self {
            RawValue::Missing => None,
            RawValue::Number(v) => Some(format_number(v)),
            RawValue::DateTime(dt) => Some(format_datetime(&dt)),
            RawValue::Text(s) => Some(s),
        }
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => RawValue::Missing,
            Value::Bool(b) => RawValue::Number(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => n.as_f64().map_or(RawValue::Missing, RawValue::Number),
            Value::String(s) => RawValue::Text(s.clone()),
            other => RawValue::Text(other.to_string()),
        }
    }
}

/// Колонка с выведенным типом: только числа - Float64, только даты -
/// Datetime, всё остальное (включая полностью пустую) - String
pub fn build_column(name: &str, values: Vec<RawValue>) -> Result<Column> {
    let present: Vec<&RawValue> = values.iter().filter(|v| !v.is_missing()).collect();

    if !present.is_empty() && present.iter().all(|v| matches!(v, RawValue::Number(_))) {
        let numbers: Vec<Option<f64>> = values
            .iter()
            .map(|v| match v {
                RawValue::Number(n) => Some(*n),
                _ => None,
            })
            .collect();
        return Ok(Column::from(Series::new(name.into(), numbers)));
    }

    if !present.is_empty() && present.iter().all(|v| matches!(v, RawValue::DateTime(_))) {
        let dates: Vec<Option<NaiveDateTime>> = values
            .iter()
            .map(|v| match v {
                RawValue::DateTime(dt) => Some(*dt),
                _ => None,
            })
            .collect();
        return datetime_column(name, &dates);
    }

    let texts: Vec<Option<String>> = values.into_iter().map(RawValue::into_text).collect();
    let refs: Vec<Option<&str>> = texts.iter().map(|t| t.as_deref()).collect();
    Ok(Column::from(Series::new(name.into(), refs)))
}

/// Таблица из именованных колонок одинаковой длины; повторы имён получают суффиксы
pub fn build_frame(columns: Vec<(String, Vec<RawValue>)>) -> Result<DataFrame> {
    if let Some((_, first)) = columns.first() {
        let n_rows = first.len();
        if let Some((name, bad)) = columns.iter().find(|(_, values)| values.len() != n_rows) {
            return Err(BiError::invalid_column(
                name,
                format!("has {} rows, expected {}", bad.len(), n_rows),
            ));
        }
    }

    let names: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
    let built = unique_names(&names)
        .into_iter()
        .zip(columns)
        .map(|(name, (_, values))| build_column(&name, values))
        .collect::<Result<Vec<Column>>>()?;

    Ok(DataFrame::new(built)?)
}

/// Уникальные имена: повторы получают суффиксы `.1`, `.2`, ...
pub fn unique_names(names: &[String]) -> Vec<String> {
    let originals: HashSet<&str> = names.iter().map(String::as_str).collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(names.len());
    for name in names {
        if seen.insert(name.clone()) {
            unique.push(name.clone());
            continue;
        }

        let mut suffix = 1;
        let candidate = loop {
            let candidate = format!("{}.{}", name, suffix);
            if !seen.contains(&candidate) && !originals.contains(candidate.as_str()) {
                break candidate;
            }
            suffix += 1;
        };
        seen.insert(candidate.clone());
        unique.push(candidate);
    }
    unique
}

pub fn rename_column(column: &Column, name: &str) -> Column {
    Column::from(column.as_materialized_series().clone().with_name(name.into()))
}

pub fn column_type(column: &Column) -> ColumnType {
    ColumnType::from_dtype(column.dtype())
}

pub fn f64_values(column: &Column) -> Result<Vec<Option<f64>>> {
    let values = column.cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter().collect())
}

pub fn text_values(column: &Column) -> Result<Vec<Option<String>>> {
    let values = column.cast(&DataType::String)?;
    Ok(values.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Миллисекунды Unix для колонок Date / Datetime любой единицы
pub fn datetime_millis(column: &Column) -> Result<Column> {
    Ok(column
        .cast(&DataType::Datetime(DATETIME_UNIT, None))?
        .cast(&DataType::Int64)?)
}

pub fn datetime_values(column: &Column) -> Result<Vec<Option<NaiveDateTime>>> {
    let millis = datetime_millis(column)?;
    Ok(millis
        .i64()?
        .into_iter()
        .map(|v| v.and_then(DateTime::from_timestamp_millis).map(|dt| dt.naive_utc()))
        .collect())
}

pub fn datetime_column(name: &str, values: &[Option<NaiveDateTime>]) -> Result<Column> {
    let millis: Vec<Option<i64>> = values
        .iter()
        .map(|v| v.map(|dt| dt.and_utc().timestamp_millis()))
        .collect();
    millis_to_datetime(Column::from(Series::new(name.into(), millis)))
}

pub fn millis_to_datetime(column: Column) -> Result<Column> {
    Ok(column.cast(&DataType::Datetime(DATETIME_UNIT, None))?)
}

pub fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.num_seconds_from_midnight() == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Целые без дробной части: 5.0 -> "5"
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnView {
    pub name: String,
    pub dtype: ColumnType,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub columns: Vec<ColumnView>,
}

/// JSON-представление: числа, даты строками, текст; пропуски - null
pub fn table_view(df: &DataFrame) -> Result<TableView> {
    let columns = df
        .get_columns()
        .iter()
        .map(|column| {
            let dtype = column_type(column);
            let values: Vec<Value> = match dtype {
                ColumnType::Numeric => f64_values(column)?
                    .into_iter()
                    .map(|v| v.map_or(Value::Null, |n| serde_json::json!(n)))
                    .collect(),
                ColumnType::DateTime => datetime_values(column)?
                    .into_iter()
                    .map(|v| v.map_or(Value::Null, |dt| Value::String(format_datetime(&dt))))
                    .collect(),
                ColumnType::Text | ColumnType::Categorical => text_values(column)?
                    .into_iter()
                    .map(|v| v.map_or(Value::Null, Value::String))
                    .collect(),
            };

            Ok(ColumnView {
                name: column.name().to_string(),
                dtype,
                values,
            })
        })
        .collect::<Result<Vec<ColumnView>>>()?;

    Ok(TableView { columns })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_build_column_types() {
        let numbers = build_column("qty", vec![RawValue::Number(1.0), RawValue::Missing]).unwrap();
        assert_eq!(column_type(&numbers), ColumnType::Numeric);
        assert_eq!(numbers.null_count(), 1);

        let dates = build_column("when", vec![RawValue::DateTime(date(2024, 1, 10))]).unwrap();
        assert_eq!(column_type(&dates), ColumnType::DateTime);
        assert_eq!(datetime_values(&dates).unwrap(), vec![Some(date(2024, 1, 10))]);

        let mixed = build_column(
            "code",
            vec![RawValue::Number(7.0), RawValue::Text("x".to_string()), RawValue::Missing],
        )
        .unwrap();
        assert_eq!(column_type(&mixed), ColumnType::Text);
        assert_eq!(
            text_values(&mixed).unwrap(),
            vec![Some("7".to_string()), Some("x".to_string()), None]
        );

        let empty = build_column("notes", vec![RawValue::Missing, RawValue::Missing]).unwrap();
        assert_eq!(column_type(&empty), ColumnType::Text);
    }

    #[test]
    fn test_build_frame_checks_lengths() {
        let err = build_frame(vec![
            ("a".to_string(), vec![RawValue::Number(1.0)]),
            ("b".to_string(), vec![RawValue::Number(1.0), RawValue::Number(2.0)]),
        ])
        .unwrap_err();
        assert!(matches!(err, BiError::InvalidColumn { ref column, .. } if column == "b"));
    }

    #[test]
    fn test_duplicate_names_get_suffixes() {
        let names: Vec<String> = ["Qty", "Qty", "Qty.1", "Qty"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_names(&names), vec!["Qty", "Qty.2", "Qty.1", "Qty.3"]);
    }

    #[test]
    fn test_json_values() {
        let values: Vec<RawValue> = [serde_json::json!(1.5), serde_json::json!(true), Value::Null]
            .iter()
            .map(RawValue::from)
            .collect();
        assert_eq!(values, vec![RawValue::Number(1.5), RawValue::Number(1.0), RawValue::Missing]);
    }

    #[test]
    fn test_table_view() {
        let df = build_frame(vec![
            ("when".to_string(), vec![RawValue::DateTime(date(2024, 2, 1)), RawValue::Missing]),
            ("total".to_string(), vec![RawValue::Number(2.5), RawValue::Number(4.0)]),
        ])
        .unwrap();

        let view = table_view(&df).unwrap();
        assert_eq!(view.columns[0].dtype, ColumnType::DateTime);
        assert_eq!(view.columns[0].values, vec![Value::String("2024-02-01".to_string()), Value::Null]);
        assert_eq!(view.columns[1].values, vec![serde_json::json!(2.5), serde_json::json!(4.0)]);
    }
}
