//! Чтение загруженных файлов (CSV / Excel) в сырую таблицу

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, DataType as _, Reader};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::config::NormalizerConfig;
use crate::error::{BiError, Result};
use crate::frame::{build_frame, RawValue};
use crate::types::RawTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    Spreadsheet,
    Delimited,
}

impl FileFormat {
    /// Всё, что не похоже на Excel, читаем как CSV
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_lowercase();
        if lower.ends_with(".xlsx") || lower.ends_with(".xls") || lower.ends_with(".xlsm") || lower.ends_with(".ods") {
            FileFormat::Spreadsheet
        } else {
            FileFormat::Delimited
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Spreadsheet => write!(f, "spreadsheet"),
            FileFormat::Delimited => write!(f, "delimited"),
        }
    }
}

pub fn ingest_file(filename: &str, bytes: &[u8], config: &NormalizerConfig) -> Result<RawTable> {
    let format = FileFormat::from_filename(filename);
    tracing::info!("Ingesting '{}' ({} bytes) as {}", filename, bytes.len(), format);

    let table = match format {
        FileFormat::Spreadsheet => read_spreadsheet(filename, bytes, config)?,
        FileFormat::Delimited => read_delimited(filename, bytes, config)?,
    };

    tracing::info!("Ingested '{}': {} rows x {} columns", filename, table.height(), table.width());
    Ok(table)
}

/// Чтение с диска; файл закрывается до разбора при любом исходе
pub fn ingest_path(path: impl AsRef<Path>, config: &NormalizerConfig) -> Result<RawTable> {
    let path = path.as_ref();
    let name = path.to_string_lossy();
    let bytes = std::fs::read(path).map_err(|e| BiError::unreadable(&name, e))?;
    ingest_file(&name, &bytes, config)
}

fn read_delimited(filename: &str, bytes: &[u8], config: &NormalizerConfig) -> Result<RawTable> {
    let null_values: Vec<PlSmallStr> = config.missing_markers.iter().map(|m| m.as_str().into()).collect();

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(CsvParseOptions::default().with_null_values(Some(NullValues::AllColumns(null_values))))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| BiError::unreadable(filename, e))?;

    if df.width() == 0 {
        return Err(BiError::unreadable(filename, "no columns to parse"));
    }

    // Логические колонки считаем числовыми 1/0
    let columns = df
        .get_columns()
        .iter()
        .map(|column| match column.dtype() {
            DataType::Boolean => column.cast(&DataType::Float64),
            _ => Ok(column.clone()),
        })
        .collect::<PolarsResult<Vec<Column>>>()?;

    Ok(DataFrame::new(columns)?)
}

fn header_name(raw: &str, idx: usize) -> String {
    if raw.trim().is_empty() {
        format!("Unnamed: {}", idx)
    } else {
        raw.to_string()
    }
}

fn read_spreadsheet(filename: &str, bytes: &[u8], config: &NormalizerConfig) -> Result<RawTable> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| BiError::unreadable(filename, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| BiError::unreadable(filename, "workbook has no sheets"))?
        .map_err(|e| BiError::unreadable(filename, e))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| BiError::unreadable(filename, "sheet is empty"))?;

    let headers: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| header_name(&cell.to_string(), i))
        .collect();

    let mut values: Vec<Vec<RawValue>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(headers.len()) {
            values[i].push(spreadsheet_value(cell, config));
        }
    }

    build_frame(headers.into_iter().zip(values).collect()).map_err(|e| BiError::unreadable(filename, e))
}

fn parse_text(value: &str, config: &NormalizerConfig) -> RawValue {
    let trimmed = value.trim();
    if config.is_missing_marker(trimmed) {
        return RawValue::Missing;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => RawValue::Number(v),
        _ => RawValue::Text(trimmed.to_string()),
    }
}

fn spreadsheet_value(cell: &Data, config: &NormalizerConfig) -> RawValue {
    match cell {
        Data::Int(v) => RawValue::Number(*v as f64),
        Data::Float(v) if v.is_finite() => RawValue::Number(*v),
        Data::Bool(b) => RawValue::Number(if *b { 1.0 } else { 0.0 }),
        Data::String(s) => parse_text(s, config),
        // Длительность ([h]:mm:ss) - число секунд
        Data::DateTime(dt) if dt.is_duration() => dt
            .as_duration()
            .map(|d| RawValue::Number(d.num_milliseconds() as f64 / 1000.0))
            .unwrap_or(RawValue::Missing),
        Data::DateTime(_) | Data::DateTimeIso(_) => {
            cell.as_datetime().map(RawValue::DateTime).unwrap_or(RawValue::Missing)
        }
        Data::DurationIso(s) => RawValue::Text(s.clone()),
        _ => RawValue::Missing,
    }
}
