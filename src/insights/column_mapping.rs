//! Сопоставление доменных заголовков с каноническими именами

use polars::prelude::{Column, DataFrame};

use crate::error::{BiError, Result};
use crate::frame::rename_column;

pub const PRODUCT: &str = "Product";
pub const TOTAL_PRICE: &str = "TotalPrice";
pub const ORDER_DATE: &str = "OrderDate";

/// Колонки, без которых анализ продаж невозможен
pub const REQUIRED_SALES_COLUMNS: [&str; 3] = [ORDER_DATE, PRODUCT, TOTAL_PRICE];

pub struct ColumnMapper {
    renames: Vec<(String, String)>,
}

impl ColumnMapper {
    pub fn new(renames: Vec<(String, String)>) -> Self {
        Self { renames }
    }

    pub fn sales() -> Self {
        let renames = [
            ("Item_Name", PRODUCT),
            ("Item Name", PRODUCT),
            ("Total_Sale", TOTAL_PRICE),
            ("Total Sale", TOTAL_PRICE),
            ("Date", ORDER_DATE),
        ]
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();
        Self { renames }
    }

    /// Переименовывает только присутствующие колонки и не затирает существующие имена
    pub fn apply(&self, table: &DataFrame) -> Result<DataFrame> {
        let mut names: Vec<String> = table.get_column_names().iter().map(|n| n.to_string()).collect();
        for (from, to) in &self.renames {
            if names.iter().any(|n| n == to) {
                continue;
            }
            if let Some(name) = names.iter_mut().find(|n| *n == from) {
                tracing::debug!("Renaming column '{}' -> '{}'", from, to);
                *name = to.clone();
            }
        }

        let columns: Vec<Column> = table
            .get_columns()
            .iter()
            .zip(&names)
            .map(|(column, name)| {
                if column.name().as_str() == name {
                    column.clone()
                } else {
                    rename_column(column, name)
                }
            })
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

impl Default for ColumnMapper {
    fn default() -> Self {
        Self::sales()
    }
}

pub fn require_columns(table: &DataFrame, required: &[&str]) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| table.get_column_index(name).is_none())
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(BiError::MissingRequiredColumns(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{NamedFrom, Series};

    fn table(names: &[&str]) -> DataFrame {
        DataFrame::new(
            names
                .iter()
                .map(|n| Column::from(Series::new((*n).into(), [1.0])))
                .collect(),
        )
        .unwrap()
    }

    fn column_names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_sales_renames() {
        let mapped = ColumnMapper::sales()
            .apply(&table(&["Item Name", "Total_Sale", "Date", "Region"]))
            .unwrap();
        assert_eq!(column_names(&mapped), vec!["Product", "TotalPrice", "OrderDate", "Region"]);
        assert!(require_columns(&mapped, &REQUIRED_SALES_COLUMNS).is_ok());
    }

    #[test]
    fn test_existing_canonical_name_is_kept() {
        let mapped = ColumnMapper::sales().apply(&table(&["Product", "Item_Name"])).unwrap();
        assert_eq!(column_names(&mapped), vec!["Product", "Item_Name"]);
    }

    #[test]
    fn test_missing_columns_are_listed() {
        let err = require_columns(&table(&["Product"]), &REQUIRED_SALES_COLUMNS).unwrap_err();
        assert_eq!(
            err,
            BiError::MissingRequiredColumns(vec!["OrderDate".to_string(), "TotalPrice".to_string()])
        );
    }
}
