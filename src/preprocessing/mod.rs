/// Модуль подготовки данных: чтение, классификация колонок, нормализация

pub mod classify;
pub mod config;
pub mod ingest;
pub mod normalization;

pub use classify::{classify, parse_datetime};
pub use config::NormalizerConfig;
pub use ingest::{ingest_file, ingest_path, FileFormat};
pub use normalization::{NormalizationReport, TableNormalizer};
