/// Анализ продаж: лучшие/худшие продукты, помесячный тренд, рекомендации

use std::collections::BTreeMap;

use chrono::Datelike;
use polars::prelude::*;

use super::column_mapping::{require_columns, ColumnMapper, ORDER_DATE, PRODUCT, REQUIRED_SALES_COLUMNS, TOTAL_PRICE};
use crate::error::{BiError, Result};
use crate::frame::{column_type, datetime_values, f64_values};
use crate::preprocessing::TableNormalizer;
use crate::types::{
    CleanTable, ColumnType, Kpi, MonthlyRevenue, ProductRevenue, RawTable, SalesInsightsOutput, Suggestion,
};

const REVENUE: &str = "revenue";

pub struct SalesInsights;

impl SalesInsights {
    /// Сопоставление колонок, проверка обязательных и нормализация
    pub fn prepare(raw: &RawTable, mapper: &ColumnMapper, normalizer: &TableNormalizer) -> Result<CleanTable> {
        let mapped = mapper.apply(raw)?;
        require_columns(&mapped, &REQUIRED_SALES_COLUMNS)?;
        normalizer.normalize(&mapped)
    }

    pub fn analyze(table: &DataFrame) -> Result<SalesInsightsOutput> {
        require_columns(table, &REQUIRED_SALES_COLUMNS)?;

        let product_revenue = Self::product_revenue(table)?;
        let monthly_revenue = Self::monthly_revenue(table)?;
        let monthly_growth_percent = Self::monthly_growth(&monthly_revenue);

        let top_product = product_revenue.first().cloned();
        let worst_product = product_revenue.last().cloned();

        let mut suggestions = Vec::new();
        if let (Some(top), Some(worst)) = (&top_product, &worst_product) {
            suggestions.push(Suggestion {
                r#type: "product_performance".to_string(),
                title: "Product Performance Insights".to_string(),
                text: format!(
                    "Your best-selling product is {}, generating {} in revenue. Consider promoting it more heavily or bundling it with other items.",
                    top.product,
                    format_money(top.revenue)
                ),
            });
            suggestions.push(Suggestion {
                r#type: "improvement".to_string(),
                title: "Areas for Improvement".to_string(),
                text: format!(
                    "The product {} is your lowest performer, with sales of only {}. Evaluate its market fit, consider a promotional discount, or discontinue it.",
                    worst.product,
                    format_money(worst.revenue)
                ),
            });

            if monthly_revenue.len() > 1 {
                suggestions.push(Self::trend_suggestion(monthly_growth_percent));
            }

            suggestions.push(Suggestion {
                r#type: "bundles".to_string(),
                title: "Actionable Suggestion: Bundles".to_string(),
                text: format!(
                    "Consider pairing your top seller, '{}', with a complementary mid-range item. Bundles raise the average order value and move less popular inventory.",
                    top.product
                ),
            });
            suggestions.push(Suggestion {
                r#type: "pricing".to_string(),
                title: "Profit Maximization Tip".to_string(),
                text: format!(
                    "Review your pricing strategy. A small price increase on high-demand items like '{}' could boost profit without deterring customers.",
                    top.product
                ),
            });
        }

        tracing::info!(
            "Sales insights: {} products, {} months, {} suggestions",
            product_revenue.len(),
            monthly_revenue.len(),
            suggestions.len()
        );

        Ok(SalesInsightsOutput {
            product_revenue,
            top_product,
            worst_product,
            monthly_revenue,
            monthly_growth_percent,
            suggestions,
        })
    }

    /// Выручка по продуктам, по убыванию; при равенстве - по имени
    pub fn product_revenue(table: &DataFrame) -> Result<Vec<ProductRevenue>> {
        let products = table
            .column(PRODUCT)
            .map_err(|_| BiError::MissingRequiredColumns(vec![PRODUCT.to_string()]))?
            .cast(&DataType::String)?;
        let totals = Self::numeric_column(table, TOTAL_PRICE)?;

        let grouped = DataFrame::new(vec![products, totals])?
            .lazy()
            .filter(col(PRODUCT).is_not_null())
            .group_by([col(PRODUCT)])
            .agg([col(TOTAL_PRICE).sum().alias(REVENUE)])
            .sort_by_exprs(
                [col(REVENUE), col(PRODUCT)],
                SortMultipleOptions::default().with_order_descending_multi([true, false]),
            )
            .collect()?;

        let names = grouped.column(PRODUCT)?.str()?;
        let revenue = grouped.column(REVENUE)?.f64()?;
        Ok(names
            .into_iter()
            .zip(revenue.into_iter())
            .filter_map(|(product, revenue)| {
                product.map(|p| ProductRevenue {
                    product: p.to_string(),
                    revenue: revenue.unwrap_or(0.0),
                })
            })
            .collect())
    }

    /// Выручка по календарным месяцам в хронологическом порядке
    pub fn monthly_revenue(table: &DataFrame) -> Result<Vec<MonthlyRevenue>> {
        let dates = table
            .column(ORDER_DATE)
            .map_err(|_| BiError::MissingRequiredColumns(vec![ORDER_DATE.to_string()]))?;
        if column_type(dates) != ColumnType::DateTime {
            return Err(BiError::invalid_column(ORDER_DATE, "order dates must be parsed as datetime"));
        }
        let totals = f64_values(&Self::numeric_column(table, TOTAL_PRICE)?)?;

        let mut grouped: BTreeMap<(i32, u32), f64> = BTreeMap::new();
        for (date, total) in datetime_values(dates)?.into_iter().zip(totals) {
            if let Some(dt) = date {
                *grouped.entry((dt.year(), dt.month())).or_insert(0.0) += total.unwrap_or(0.0);
            }
        }

        Ok(grouped
            .into_iter()
            .map(|((year, month), revenue)| MonthlyRevenue { year, month, revenue })
            .collect())
    }

    /// Рост последнего месяца к предыдущему в процентах
    pub fn monthly_growth(monthly: &[MonthlyRevenue]) -> Option<f64> {
        match monthly {
            [.., prev, last] if prev.revenue != 0.0 => Some((last.revenue - prev.revenue) / prev.revenue * 100.0),
            _ => None,
        }
    }

    fn trend_suggestion(growth: Option<f64>) -> Suggestion {
        let text = match growth {
            Some(g) if g >= 0.0 => format!(
                "Your sales in the last month grew by {:.2}% compared to the previous month. Keep up the great work!",
                g
            ),
            Some(g) => format!(
                "Your sales in the last month decreased by {:.2}%. Let's look at strategies to reverse this trend.",
                g.abs()
            ),
            None => "Your previous month had no recorded sales, so last month's growth cannot be expressed as a percentage.".to_string(),
        };

        Suggestion {
            r#type: "monthly_trend".to_string(),
            title: "Monthly Sales Trend".to_string(),
            text,
        }
    }

    fn numeric_column(table: &DataFrame, name: &str) -> Result<Column> {
        let column = table
            .column(name)
            .map_err(|_| BiError::MissingRequiredColumns(vec![name.to_string()]))?;
        if column_type(column) != ColumnType::Numeric {
            return Err(BiError::invalid_column(name, "must be numeric"));
        }
        Ok(column.cast(&DataType::Float64)?)
    }
}

/// KPI для дашборда и отчёта: число записей и суммы первых двух числовых колонок
pub fn kpi_summary(table: &DataFrame) -> Result<Vec<Kpi>> {
    let mut kpis = vec![Kpi {
        label: "Total Records".to_string(),
        value: table.height() as f64,
    }];

    for column in table
        .get_columns()
        .iter()
        .filter(|c| column_type(c) == ColumnType::Numeric)
        .take(2)
    {
        let total = column.cast(&DataType::Float64)?.f64()?.sum().unwrap_or(0.0);
        kpis.push(Kpi {
            label: format!("Total {}", column.name()),
            value: total,
        });
    }

    Ok(kpis)
}

/// $1,234.50
pub fn format_money(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, frac_part)
}
