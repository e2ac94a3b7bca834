//! Assembles every derived table for one contract selection

use serde::Serialize;
use tracing::info;

use crate::analytics::{
    build_insight_export, charges_box_summary, compute_churn_summary, correlation_matrix,
    grouped_churn_rate, grouped_counts, ChargesBoxSummary, ChurnSummary, CorrelationMatrix,
    GroupedCounts, GroupedRateTable, InsightExportRow,
};
use crate::data::{Dataset, FilteredView, CHURN, CONTRACT, INTERNET_SERVICE, MONTHLY_CHARGES};

/// Everything a renderer needs to draw the dashboard for one selection
#[derive(Debug, Clone, Serialize)]
pub struct ChurnReport {
    /// Breakdown over the whole dataset
    pub summary: ChurnSummary,
    pub contract: String,
    pub filtered_rows: usize,
    /// Internet service x churn label counts within the selection
    pub internet_counts: GroupedCounts,
    pub contract_rates: GroupedRateTable,
    pub internet_rates: GroupedRateTable,
    pub monthly_charges: ChargesBoxSummary,
    pub correlation: CorrelationMatrix,
    pub insights: Vec<InsightExportRow>,
    #[serde(skip)]
    pub view: FilteredView,
}

/// Recompute all derived tables for `contract`.
///
/// Call again whenever the selection changes; nothing is cached.
pub fn analyze(dataset: &Dataset, contract: &str) -> crate::Result<ChurnReport> {
    let summary = compute_churn_summary(dataset)?;
    let view = dataset.filter(contract)?;
    info!(
        contract,
        rows = view.height(),
        churn_rate = summary.rate,
        "analysing selection"
    );

    let internet_counts = grouped_counts(&view, INTERNET_SERVICE, CHURN)?;
    let contract_rates = grouped_churn_rate(&view, CONTRACT)?;
    let internet_rates = grouped_churn_rate(&view, INTERNET_SERVICE)?;
    let monthly_charges = charges_box_summary(&view, MONTHLY_CHARGES)?;
    let correlation = correlation_matrix(&view)?;
    let insights = build_insight_export(&contract_rates, &internet_rates);

    Ok(ChurnReport {
        summary,
        contract: contract.to_string(),
        filtered_rows: view.height(),
        internet_counts,
        contract_rates,
        internet_rates,
        monthly_charges,
        correlation,
        insights,
        view,
    })
}
