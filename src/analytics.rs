//! Churn statistics: summary, grouped counts and rates, correlations and exports

use std::collections::{BTreeMap, BTreeSet};

use ndarray::Array2;
use polars::prelude::*;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::data::{float_values, require_column, string_values, Dataset, FilteredView, CHURN};
use crate::error::ChurnError;

/// Churn label counted as a churned customer
pub const CHURN_YES: &str = "Yes";
/// Churn label counted as a retained customer
pub const CHURN_NO: &str = "No";

const COUNT_ALIAS: &str = "__group_size";

/// Overall churn breakdown of a dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnSummary {
    /// Records per churn label
    pub counts: BTreeMap<String, usize>,
    /// Records with a non-null churn label
    pub total: usize,
    /// Fraction of counted records labelled "Yes"
    pub rate: f64,
}

impl ChurnSummary {
    pub fn count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }
}

/// Count churn labels over the whole dataset.
///
/// A dataset without any "Yes" label is valid and reports a rate of 0.
pub fn compute_churn_summary(dataset: &Dataset) -> crate::Result<ChurnSummary> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for label in string_values(dataset.frame(), CHURN)?.into_iter().flatten() {
        *counts.entry(label).or_insert(0) += 1;
    }

    let total: usize = counts.values().sum();
    if total == 0 {
        return Err(ChurnError::empty("no records carry a churn label"));
    }

    let churned = counts.get(CHURN_YES).copied().unwrap_or(0);
    if churned == 0 {
        warn!(total, "dataset has no churned customers");
    }

    Ok(ChurnSummary {
        rate: churned as f64 / total as f64,
        counts,
        total,
    })
}

/// Two-way count table, rows and columns sorted, absent combinations zero
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedCounts {
    pub group_column: String,
    pub split_column: String,
    pub groups: Vec<String>,
    pub splits: Vec<String>,
    /// `groups.len()` x `splits.len()`
    #[serde(serialize_with = "serialize_matrix")]
    pub counts: Array2<u64>,
}

impl GroupedCounts {
    pub fn get(&self, group: &str, split: &str) -> u64 {
        let row = self.groups.iter().position(|g| g == group);
        let column = self.splits.iter().position(|s| s == split);
        match (row, column) {
            (Some(row), Some(column)) => self.counts[[row, column]],
            _ => 0,
        }
    }

    pub fn group_total(&self, group: &str) -> u64 {
        self.groups
            .iter()
            .position(|g| g == group)
            .map(|row| self.counts.row(row).sum())
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Count records per (`group_col`, `split_col`) pair.
///
/// Rows with a null in either column are skipped.
pub fn grouped_counts(
    view: &FilteredView,
    group_col: &str,
    split_col: &str,
) -> crate::Result<GroupedCounts> {
    let frame = view.frame();
    require_column(frame, group_col)?;
    require_column(frame, split_col)?;

    let aggregated = frame
        .clone()
        .lazy()
        .select([
            col(group_col).cast(DataType::String),
            col(split_col).cast(DataType::String),
        ])
        .group_by([col(group_col), col(split_col)])
        .agg([len().alias(COUNT_ALIAS)])
        .collect()?;

    let groups_col = string_values(&aggregated, group_col)?;
    let splits_col = string_values(&aggregated, split_col)?;
    let sizes = aggregated
        .column(COUNT_ALIAS)?
        .cast(&DataType::UInt64)?;
    let sizes: Vec<Option<u64>> = sizes.u64()?.into_iter().collect();

    let mut cells: BTreeMap<(String, String), u64> = BTreeMap::new();
    let mut groups: BTreeSet<String> = BTreeSet::new();
    let mut splits: BTreeSet<String> = BTreeSet::new();
    for ((group, split), size) in groups_col.into_iter().zip(splits_col).zip(sizes) {
        let (Some(group), Some(split)) = (group, split) else {
            continue;
        };
        groups.insert(group.clone());
        splits.insert(split.clone());
        *cells.entry((group, split)).or_insert(0) += size.unwrap_or(0);
    }

    let groups: Vec<String> = groups.into_iter().collect();
    let splits: Vec<String> = splits.into_iter().collect();
    let mut counts = Array2::<u64>::zeros((groups.len(), splits.len()));
    for ((group, split), size) in cells {
        // Both keys were inserted alongside the cell
        let row = groups.binary_search(&group).unwrap_or_default();
        let column = splits.binary_search(&split).unwrap_or_default();
        counts[[row, column]] = size;
    }

    debug!(group_col, split_col, shape = ?counts.shape(), "grouped counts");
    Ok(GroupedCounts {
        group_column: group_col.to_string(),
        split_column: split_col.to_string(),
        groups,
        splits,
        counts,
    })
}

/// Share of each churn label within one group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRate {
    pub key: String,
    /// Records in the group
    pub size: u64,
    pub rates: BTreeMap<String, f64>,
}

impl GroupRate {
    pub fn rate(&self, label: &str) -> f64 {
        self.rates.get(label).copied().unwrap_or(0.0)
    }

    pub fn churn_rate(&self) -> f64 {
        self.rate(CHURN_YES)
    }
}

/// Normalised churn label counts per group, sorted by group key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedRateTable {
    pub group_column: String,
    /// Churn labels present in the view, sorted
    pub labels: Vec<String>,
    pub rows: Vec<GroupRate>,
}

impl GroupedRateTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Churn rate per group key
    pub fn churn_rates(&self) -> BTreeMap<String, f64> {
        self.rows
            .iter()
            .map(|row| (row.key.clone(), row.churn_rate()))
            .collect()
    }
}

/// Fraction of each churn label per value of `group_col`.
///
/// Every label seen in the view gets a rate in every group, 0.0 when the group
/// has none of it.
pub fn grouped_churn_rate(view: &FilteredView, group_col: &str) -> crate::Result<GroupedRateTable> {
    let counts = grouped_counts(view, group_col, CHURN)?;

    let rows = counts
        .groups
        .iter()
        .zip(counts.counts.outer_iter())
        .map(|(key, row)| {
            let size = row.sum();
            let rates = counts
                .splits
                .iter()
                .zip(row.iter())
                .map(|(label, &count)| {
                    let rate = if size == 0 {
                        0.0
                    } else {
                        count as f64 / size as f64
                    };
                    (label.clone(), rate)
                })
                .collect();
            GroupRate {
                key: key.clone(),
                size,
                rates,
            }
        })
        .collect();

    Ok(GroupedRateTable {
        group_column: group_col.to_string(),
        labels: counts.splits,
        rows,
    })
}

/// Pearson correlations between numeric columns
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Square, symmetric; NaN (null in JSON) where undefined
    #[serde(serialize_with = "serialize_matrix")]
    pub values: Array2<f64>,
}

impl CorrelationMatrix {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let row = self.columns.iter().position(|c| c == a)?;
        let column = self.columns.iter().position(|c| c == b)?;
        Some(self.values[[row, column]])
    }
}

/// Correlation matrix over the integer and float columns of a view, with
/// churn recoded as Yes=1, No=0 (other labels become null).
///
/// Observations are paired per column pair, skipping rows where either side is
/// null. Columns without variance produce NaN.
pub fn correlation_matrix(view: &FilteredView) -> crate::Result<CorrelationMatrix> {
    let frame = view.frame();
    let mut columns: Vec<String> = Vec::new();
    let mut series: Vec<Vec<Option<f64>>> = Vec::new();

    for column in frame.get_columns() {
        let name = column.name().to_string();
        if name == CHURN {
            let recoded = string_values(frame, CHURN)?
                .into_iter()
                .map(|label| match label.as_deref() {
                    Some(CHURN_YES) => Some(1.0),
                    Some(CHURN_NO) => Some(0.0),
                    _ => None,
                })
                .collect();
            series.push(recoded);
        } else if column.dtype().is_float() || column.dtype().is_integer() {
            series.push(float_values(frame, &name)?);
        } else {
            continue;
        }
        columns.push(name);
    }

    let n = columns.len();
    let mut values = Array2::<f64>::from_elem((n, n), f64::NAN);
    for i in 0..n {
        for j in i..n {
            let r = if i == j {
                if has_variance(&series[i]) {
                    1.0
                } else {
                    f64::NAN
                }
            } else {
                pearson(&series[i], &series[j])
            };
            values[[i, j]] = r;
            values[[j, i]] = r;
        }
    }

    debug!(columns = n, rows = view.height(), "correlation matrix");
    Ok(CorrelationMatrix { columns, values })
}

fn finite_values(values: &[Option<f64>]) -> impl Iterator<Item = f64> + '_ {
    values.iter().flatten().copied().filter(|v| v.is_finite())
}

fn has_variance(values: &[Option<f64>]) -> bool {
    let mut iter = finite_values(values);
    match iter.next() {
        Some(first) => iter.any(|v| v != first),
        None => false,
    }
}

fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Some((*a, *b)),
            _ => None,
        })
        .collect();

    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let divisor = (var_x * var_y).sqrt();
    if divisor == 0.0 {
        return f64::NAN;
    }
    (cov / divisor).clamp(-1.0, 1.0)
}

/// Five-number summary of one churn label's values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStats {
    pub label: String,
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Distribution of a numeric column split by churn label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargesBoxSummary {
    pub value_column: String,
    pub groups: Vec<BoxStats>,
}

/// Box-plot statistics of `value_col` per churn label, labels sorted.
///
/// Quartiles use linear interpolation between order statistics.
pub fn charges_box_summary(view: &FilteredView, value_col: &str) -> crate::Result<ChargesBoxSummary> {
    let labels = string_values(view.frame(), CHURN)?;
    let values = float_values(view.frame(), value_col)?;

    let mut by_label: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (label, value) in labels.into_iter().zip(values) {
        if let (Some(label), Some(value)) = (label, value) {
            if value.is_finite() {
                by_label.entry(label).or_default().push(value);
            }
        }
    }

    let groups = by_label
        .into_iter()
        .map(|(label, mut values)| {
            values.sort_by(|a, b| a.total_cmp(b));
            BoxStats {
                label,
                count: values.len(),
                min: values[0],
                q1: quantile(&values, 0.25),
                median: quantile(&values, 0.5),
                q3: quantile(&values, 0.75),
                max: values[values.len() - 1],
            }
        })
        .collect();

    Ok(ChargesBoxSummary {
        value_column: value_col.to_string(),
        groups,
    })
}

/// Quantile of sorted, non-empty values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Which grouped table an insight row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InsightSource {
    #[serde(rename = "Churn by Contract")]
    Contract,
    #[serde(rename = "Churn by Internet Service")]
    InternetService,
}

impl InsightSource {
    pub fn tag(self) -> &'static str {
        match self {
            InsightSource::Contract => "Churn by Contract",
            InsightSource::InternetService => "Churn by Internet Service",
        }
    }
}

/// One grouped churn-rate row tagged with its source table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightExportRow {
    pub key: String,
    pub rates: BTreeMap<String, f64>,
    #[serde(rename = "insight")]
    pub source: InsightSource,
}

impl InsightExportRow {
    pub fn rate(&self, label: &str) -> f64 {
        self.rates.get(label).copied().unwrap_or(0.0)
    }
}

/// Contract rows followed by internet-service rows, each in table order
pub fn build_insight_export(
    contract_rates: &GroupedRateTable,
    internet_rates: &GroupedRateTable,
) -> Vec<InsightExportRow> {
    let tagged = |table: &GroupedRateTable, source: InsightSource| {
        table
            .rows
            .iter()
            .map(move |row| InsightExportRow {
                key: row.key.clone(),
                rates: row.rates.clone(),
                source,
            })
            .collect::<Vec<_>>()
    };

    let mut rows = tagged(contract_rates, InsightSource::Contract);
    rows.extend(tagged(internet_rates, InsightSource::InternetService));
    rows
}

fn serialize_matrix<S, T>(matrix: &Array2<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + Clone,
{
    let rows: Vec<Vec<T>> = matrix.outer_iter().map(|row| row.to_vec()).collect();
    rows.serialize(serializer)
}
