//! churnlens: customer churn analytics over a telco-style CSV dataset
//!
//! This library loads a customer dataset with Polars, computes churn rates and
//! grouped breakdowns for a selected contract type, builds a correlation matrix
//! over the numeric columns, and hands the results to a report renderer
//! (console tables or SVG charts) alongside two CSV exports.

pub mod analytics;
pub mod cli;
pub mod data;
pub mod error;
pub mod export;
pub mod report;
pub mod viz;

// Re-export public items for easier access
pub use analytics::{
    build_insight_export, charges_box_summary, compute_churn_summary, correlation_matrix,
    grouped_churn_rate, grouped_counts, ChargesBoxSummary, ChurnSummary, CorrelationMatrix,
    GroupedCounts, GroupedRateTable, InsightExportRow, InsightSource,
};
pub use cli::Args;
pub use data::{load_dataset, Dataset, FilteredView};
pub use error::ChurnError;
pub use export::{filtered_view_csv, insights_csv, Download};
pub use report::{analyze, ChurnReport};
pub use viz::{ChartRenderer, ConsoleRenderer, ReportRenderer};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, ChurnError>;
