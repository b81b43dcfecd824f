//! Бизнес-аналитика поверх нормализованной таблицы продаж

pub mod column_mapping;
pub mod sales;

pub use column_mapping::{require_columns, ColumnMapper, ORDER_DATE, PRODUCT, REQUIRED_SALES_COLUMNS, TOTAL_PRICE};
pub use sales::{format_money, kpi_summary, SalesInsights};
