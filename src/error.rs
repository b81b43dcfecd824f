//! Типы ошибок ядра

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BiError {
    #[error("Unreadable file '{file}': {reason}")]
    UnreadableFile { file: String, reason: String },

    #[error("Invalid column '{column}': {reason}")]
    InvalidColumn { column: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Поднимается слоем сопоставления колонок, а не нормализатором
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingRequiredColumns(Vec<String>),

    #[error("Training error: {0}")]
    Training(String),

    /// Сбой операции над таблицей внутри polars
    #[error("Data processing error: {0}")]
    Data(String),
}

impl BiError {
    pub fn unreadable(file: &str, reason: impl ToString) -> Self {
        BiError::UnreadableFile {
            file: file.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_column(column: &str, reason: impl ToString) -> Self {
        BiError::InvalidColumn {
            column: column.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<PolarsError> for BiError {
    fn from(err: PolarsError) -> Self {
        BiError::Data(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BiError>;
