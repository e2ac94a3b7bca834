//! Error types for churn analytics

use plotters::drawing::DrawingAreaErrorKind;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors produced while loading, analysing, exporting or rendering a dataset
#[derive(Debug, Error)]
pub enum ChurnError {
    /// The source dataset has no rows or lacks a column the analysis needs
    #[error("empty dataset: {reason}")]
    EmptyDataset { reason: String },

    /// A grouping or value column was requested that the frame does not have
    #[error("column `{column}` not found")]
    MissingColumn { column: String },

    /// Two source headers collapse to the same name once spaces become underscores
    #[error("columns {first:?} and {second:?} both normalise to `{column}`")]
    DuplicateColumn {
        column: String,
        first: String,
        second: String,
    },

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("chart rendering failed: {0}")]
    Chart(String),
}

impl ChurnError {
    pub(crate) fn empty(reason: impl Into<String>) -> Self {
        ChurnError::EmptyDataset {
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(column: &str) -> Self {
        ChurnError::MissingColumn {
            column: column.to_string(),
        }
    }
}

impl<E> From<DrawingAreaErrorKind<E>> for ChurnError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        ChurnError::Chart(err.to_string())
    }
}
