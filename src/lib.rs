//! MSME BI - подготовка данных продаж и предиктивные модели

pub mod api;
pub mod error;
pub mod frame;
pub mod insights;
pub mod models;
pub mod preprocessing;
pub mod types;

pub use error::{BiError, Result};
pub use insights::{ColumnMapper, SalesInsights};
pub use models::{ModelSelector, SelectionConfig};
pub use preprocessing::{ingest_file, ingest_path, NormalizerConfig, TableNormalizer};
pub use types::*;
