//! Нормализация сырой таблицы в чистую

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::classify::{classify, parse_datetime};
use super::config::NormalizerConfig;
use crate::error::Result;
use crate::frame::{datetime_column, datetime_millis, millis_to_datetime, rename_column, unique_names};
use crate::types::{CleanTable, ColumnType, ColumnTypeDecision, RawTable};

/// Служебная колонка счётчика при поиске моды
const MODE_COUNT: &str = "__mode_count";

/// Что было сделано за один проход нормализации
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub renamed_columns: Vec<(String, String)>,
    pub dropped_columns: Vec<String>,
    pub duplicate_rows_removed: usize,
    pub decisions: Vec<ColumnTypeDecision>,
    pub imputed_cells: usize,
}

#[derive(Debug, Clone)]
pub struct TableNormalizer {
    config: NormalizerConfig,
}

impl TableNormalizer {
    pub fn new() -> Self {
        Self {
            config: NormalizerConfig::default(),
        }
    }

    pub fn with_config(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    pub fn normalize(&self, raw: &RawTable) -> Result<CleanTable> {
        Ok(self.normalize_with_report(raw)?.0)
    }

    /// Входная таблица не меняется: все шаги строят новые колонки
    pub fn normalize_with_report(&self, raw: &RawTable) -> Result<(CleanTable, NormalizationReport)> {
        let mut report = NormalizationReport {
            rows_before: raw.height(),
            ..Default::default()
        };

        // 1. Имена колонок
        let (columns, renamed) = Self::normalize_names(raw);
        report.renamed_columns = renamed;

        // 2. Полностью пустые колонки
        let (kept, dropped): (Vec<Column>, Vec<Column>) =
            columns.into_iter().partition(|c| c.null_count() < c.len());
        report.dropped_columns = dropped.iter().map(|c| c.name().to_string()).collect();

        // 3. Дубликаты строк
        let (table, removed) = Self::drop_duplicate_rows(DataFrame::new(kept)?)?;
        report.duplicate_rows_removed = removed;

        // 4. Типы текстовых колонок
        let mut typed = Vec::with_capacity(table.width());
        for column in table.get_columns() {
            if ColumnType::from_dtype(column.dtype()).is_resolved() {
                typed.push(column.clone());
                continue;
            }

            let decision = classify(column, &self.config);
            tracing::debug!(
                "Column '{}': parsed {:.1}% as dates, promoted: {}",
                column.name(),
                decision.parsed_fraction * 100.0,
                decision.accepted
            );

            if decision.accepted {
                typed.push(self.promote_to_datetime(column)?);
            } else {
                typed.push(column.cast(&DataType::String)?);
            }
            report.decisions.push(decision);
        }

        // 5. Заполнение пропусков, текст становится категориальным
        let mut filled = Vec::with_capacity(typed.len());
        for column in &typed {
            let (column, imputed) = self.impute(column)?;
            report.imputed_cells += imputed;
            filled.push(column);
        }

        // 6. После заполнения могли появиться новые дубликаты
        let (table, removed) = Self::drop_duplicate_rows(DataFrame::new(filled)?)?;
        report.duplicate_rows_removed += removed;

        report.rows_after = table.height();

        tracing::info!(
            "Normalized table: {} -> {} rows, {} columns dropped, {} duplicates removed, {} cells imputed",
            report.rows_before,
            report.rows_after,
            report.dropped_columns.len(),
            report.duplicate_rows_removed,
            report.imputed_cells
        );

        Ok((CleanTable::from_normalized(table), report))
    }

    /// Обрезка пробелов и уникальность имён (суффиксы `.1`, `.2`, ...)
    fn normalize_names(table: &DataFrame) -> (Vec<Column>, Vec<(String, String)>) {
        let trimmed: Vec<String> = table
            .get_columns()
            .iter()
            .map(|c| c.name().trim().to_string())
            .collect();

        let mut renamed = Vec::new();
        let columns = table
            .get_columns()
            .iter()
            .zip(unique_names(&trimmed))
            .map(|(column, name)| {
                if column.name().as_str() == name {
                    column.clone()
                } else {
                    renamed.push((column.name().to_string(), name.clone()));
                    rename_column(column, &name)
                }
            })
            .collect();

        (columns, renamed)
    }

    /// Удаляет повторяющиеся строки, сохраняя первое вхождение и порядок
    fn drop_duplicate_rows(table: DataFrame) -> Result<(DataFrame, usize)> {
        if table.width() == 0 {
            return Ok((table, 0));
        }

        let before = table.height();
        let deduped = table.unique_stable(None, UniqueKeepStrategy::First, None)?;
        let removed = before - deduped.height();
        Ok((deduped, removed))
    }

    fn promote_to_datetime(&self, column: &Column) -> Result<Column> {
        let texts = column.cast(&DataType::String)?;
        // classify уже гарантировал разбор каждой непустой строки
        let parsed: Vec<Option<NaiveDateTime>> = texts
            .str()?
            .into_iter()
            .map(|v| v.and_then(|s| parse_datetime(s, &self.config)))
            .collect();
        datetime_column(column.name().as_str(), &parsed)
    }

    /// Медиана для чисел, мода для остального. Возвращает колонку и число заполненных ячеек.
    fn impute(&self, column: &Column) -> Result<(Column, usize)> {
        let missing = column.null_count();
        let dtype = ColumnType::from_dtype(column.dtype());

        if missing == 0 {
            let column = match dtype {
                ColumnType::Text => column.cast(&categorical())?,
                _ => column.clone(),
            };
            return Ok((column, 0));
        }

        let filled = match dtype {
            ColumnType::Numeric => {
                let values = column.cast(&DataType::Float64)?;
                // Числовая колонка без значений удаляется раньше
                let fill = median(&values)?.unwrap_or(0.0);
                Column::from(values.f64()?.fill_null_with_values(fill)?.into_series())
            }
            ColumnType::DateTime => {
                let millis = datetime_millis(column)?;
                let top = most_frequent(&millis)?;
                let fill = top.i64()?.get(0).unwrap_or(0);
                millis_to_datetime(Column::from(millis.i64()?.fill_null_with_values(fill)?.into_series()))?
            }
            ColumnType::Text | ColumnType::Categorical => {
                let texts = column.cast(&DataType::String)?;
                let fill = mode_text(&texts)?.unwrap_or_else(|| self.config.fill_label.clone());
                {
                    let ca = texts.str()?;
                    let full = StringChunked::full(ca.name().clone(), fill.as_str(), ca.len());
                    Column::from(ca.zip_with(&ca.is_not_null(), &full)?.into_series()).cast(&categorical())?
                }
            }
        };

        Ok((filled, missing))
    }
}

impl Default for TableNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn categorical() -> DataType {
    DataType::Categorical(None, CategoricalOrdering::Physical)
}

pub fn median(column: &Column) -> Result<Option<f64>> {
    Ok(column.cast(&DataType::Float64)?.f64()?.median())
}

/// Самое частое непустое значение; при равенстве частот - наименьшее
pub fn mode_text(column: &Column) -> Result<Option<String>> {
    let top = most_frequent(&column.cast(&DataType::String)?)?;
    let value = top.str()?.get(0).map(str::to_string);
    Ok(value)
}

/// Одна строка (или ни одной) с самым частым непустым значением колонки
fn most_frequent(column: &Column) -> Result<Column> {
    let name = column.name().clone();
    let top = DataFrame::new(vec![column.clone()])?
        .lazy()
        .filter(col(name.clone()).is_not_null())
        .group_by([col(name.clone())])
        .agg([len().alias(MODE_COUNT)])
        .sort_by_exprs(
            [col(MODE_COUNT), col(name.clone())],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .limit(1)
        .collect()?;

    Ok(top.column(name.as_str())?.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{build_frame, datetime_values, f64_values, text_values, RawValue};
    use chrono::NaiveDate;

    fn sales_table() -> DataFrame {
        df!(
            " Product " => ["A", "A", "B", "A"],
            "TotalPrice" => [Some(10.0), Some(20.0), None, Some(10.0)],
            "OrderDate" => ["2024-01-05", "2024-01-20", "2024-02-03", "2024-01-05"],
            "Notes" => [None::<&str>, None, None, None],
        )
        .unwrap()
    }

    fn column_names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_normalize_sales_table() {
        let raw = sales_table();
        let (clean, report) = TableNormalizer::new().normalize_with_report(&raw).unwrap();

        assert_eq!(column_names(&clean), vec!["Product", "TotalPrice", "OrderDate"]);
        assert_eq!(report.renamed_columns, vec![(" Product ".to_string(), "Product".to_string())]);
        assert_eq!(report.dropped_columns, vec!["Notes".to_string()]);
        assert_eq!(report.duplicate_rows_removed, 1);
        assert_eq!(report.imputed_cells, 1);
        assert_eq!(clean.height(), 3);
        assert_eq!(clean.total_missing(), 0);

        assert_eq!(clean.column_type("OrderDate"), Some(ColumnType::DateTime));
        let dates = datetime_values(clean.column("OrderDate").unwrap()).unwrap();
        assert_eq!(
            dates[0],
            Some(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(0, 0, 0).unwrap())
        );

        // медиана 10 и 20
        let price = f64_values(clean.column("TotalPrice").unwrap()).unwrap();
        assert_eq!(price, vec![Some(10.0), Some(20.0), Some(15.0)]);

        assert_eq!(clean.column_type("Product"), Some(ColumnType::Categorical));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let raw = sales_table();
        let before = raw.clone();
        let _ = TableNormalizer::new().normalize(&raw).unwrap();
        assert!(raw.equals_missing(&before));
    }

    #[test]
    fn test_duplicate_names_get_suffix() {
        let raw = df!("Qty" => [1.0], " Qty" => [2.0], "Qty " => [3.0]).unwrap();
        let clean = TableNormalizer::new().normalize(&raw).unwrap();
        assert_eq!(column_names(&clean), vec!["Qty", "Qty.1", "Qty.2"]);
    }

    #[test]
    fn test_mode_fill_prefers_smallest_on_tie() {
        let raw = df!(
            "Region" => [Some("North"), Some("East"), None, Some("South")],
            "Amount" => [1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        let clean = TableNormalizer::new().normalize(&raw).unwrap();
        let region = text_values(clean.column("Region").unwrap()).unwrap();
        assert_eq!(region[2].as_deref(), Some("East"));
    }

    #[test]
    fn test_numbers_in_text_column_become_text() {
        let raw = build_frame(vec![(
            "Code".to_string(),
            vec![RawValue::Text("X1".to_string()), RawValue::Number(42.0)],
        )])
        .unwrap();
        let clean = TableNormalizer::new().normalize(&raw).unwrap();
        assert_eq!(clean.column_type("Code"), Some(ColumnType::Categorical));
        let code = text_values(clean.column("Code").unwrap()).unwrap();
        assert_eq!(code, vec![Some("X1".to_string()), Some("42".to_string())]);
    }

    #[test]
    fn test_imputation_duplicates_are_removed() {
        let raw = df!(
            "Product" => [Some("A"), Some("A"), None],
            "Qty" => [1.0, 1.0, 1.0],
        )
        .unwrap();
        // третья строка после заполнения модой совпадает с первой
        let clean = TableNormalizer::new().normalize(&raw).unwrap();
        assert_eq!(clean.height(), 1);
    }

    #[test]
    fn test_datetime_gaps_take_the_mode() {
        let day = |d: u32| RawValue::DateTime(NaiveDate::from_ymd_opt(2024, 3, d).unwrap().and_hms_opt(0, 0, 0).unwrap());
        let raw = build_frame(vec![
            ("When".to_string(), vec![day(2), day(1), day(2), RawValue::Missing]),
            ("Id".to_string(), (0..4).map(|i| RawValue::Number(i as f64)).collect()),
        ])
        .unwrap();

        let clean = TableNormalizer::new().normalize(&raw).unwrap();
        let when = datetime_values(clean.column("When").unwrap()).unwrap();
        assert_eq!(when[3], when[0]);
    }

    #[test]
    fn test_sparse_dates_stay_idempotent() {
        let raw = df!(
            "When" => [None, None, None, None, Some("2024-05-01")],
            "Id" => [0.0, 1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();

        let normalizer = TableNormalizer::new();
        let once = normalizer.normalize(&raw).unwrap();
        assert_eq!(once.column_type("When"), Some(ColumnType::Categorical));
        let twice = normalizer.normalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_median_and_mode_helpers() {
        let numbers = Column::from(Series::new("x".into(), [Some(3.0), None, Some(1.0), Some(2.0)]));
        assert_eq!(median(&numbers).unwrap(), Some(2.0));
        let empty = Column::from(Series::new("x".into(), [None::<f64>]));
        assert_eq!(median(&empty).unwrap(), None);

        let texts = Column::from(Series::new("x".into(), ["b", "a", "b"]));
        assert_eq!(mode_text(&texts).unwrap(), Some("b".to_string()));
        let missing = Column::from(Series::new("x".into(), [None::<&str>]));
        assert_eq!(mode_text(&missing).unwrap(), None);
    }
}
