//! CSV download payloads for the filtered view and the insights table

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::analytics::{InsightExportRow, InsightSource};
use crate::data::{FilteredView, CONTRACT, INTERNET_SERVICE};

pub const FILTERED_EXPORT_NAME: &str = "filtered_churn_data.csv";
pub const INSIGHTS_EXPORT_NAME: &str = "churn_insights.csv";
pub const CSV_MIME: &str = "text/csv";

/// Column carrying the provenance tag in the insights export
pub const INSIGHT_COLUMN: &str = "Insight";

/// A file offered for download: UTF-8 bytes plus name and mime type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: &'static str,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl Download {
    fn csv(file_name: &'static str, bytes: Vec<u8>) -> Self {
        Self {
            file_name,
            mime: CSV_MIME,
            bytes,
        }
    }

    /// Write the payload into `dir`, creating it if needed
    pub fn write_to(&self, dir: &Path) -> crate::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name);
        fs::write(&path, &self.bytes)?;
        info!(path = %path.display(), bytes = self.bytes.len(), "export written");
        Ok(path)
    }
}

/// The filtered view serialised as CSV with a header row
pub fn filtered_view_csv(view: &FilteredView) -> crate::Result<Download> {
    let mut frame = view.frame().clone();
    Ok(Download::csv(FILTERED_EXPORT_NAME, write_csv(&mut frame)?))
}

/// Insight rows as CSV: `Contract`, `InternetService`, one column per churn
/// label, then `Insight`.
///
/// The key column that does not apply to a row is left empty and labels a
/// row lacks are written as 0.
pub fn insights_csv(rows: &[InsightExportRow]) -> crate::Result<Download> {
    let mut frame = insights_frame(rows)?;
    Ok(Download::csv(INSIGHTS_EXPORT_NAME, write_csv(&mut frame)?))
}

fn insights_frame(rows: &[InsightExportRow]) -> crate::Result<DataFrame> {
    let key_for = |source: InsightSource| {
        rows.iter()
            .map(|row| (row.source == source).then_some(row.key.as_str()))
            .collect::<Vec<Option<&str>>>()
    };

    let labels: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.rates.keys().map(String::as_str))
        .collect();

    let mut columns = vec![
        Column::new(CONTRACT.into(), key_for(InsightSource::Contract)),
        Column::new(INTERNET_SERVICE.into(), key_for(InsightSource::InternetService)),
    ];
    for label in labels {
        let rates: Vec<f64> = rows.iter().map(|row| row.rate(label)).collect();
        columns.push(Column::new(label.into(), rates));
    }
    let tags: Vec<&str> = rows.iter().map(|row| row.source.tag()).collect();
    columns.push(Column::new(INSIGHT_COLUMN.into(), tags));

    Ok(DataFrame::new(columns)?)
}

fn write_csv(frame: &mut DataFrame) -> crate::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    CsvWriter::new(&mut bytes)
        .include_header(true)
        .finish(frame)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{build_insight_export, grouped_churn_rate};
    use crate::data::read_csv_bytes;
    use tempfile::tempdir;

    const CSV: &[u8] = b"customerID,Contract,InternetService,MonthlyCharges,Churn
C-1,Month-to-month,DSL,29.85,No
C-2,Month-to-month,Fiber optic,70.70,Yes
C-3,One year,DSL,56.95,No
";

    fn export_lines(download: &Download) -> Vec<String> {
        String::from_utf8(download.bytes.clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_filtered_view_csv() {
        let dataset = read_csv_bytes(CSV).unwrap();
        let view = dataset.filter("Month-to-month").unwrap();

        let download = filtered_view_csv(&view).unwrap();
        assert_eq!(download.file_name, "filtered_churn_data.csv");
        assert_eq!(download.mime, "text/csv");

        let lines = export_lines(&download);
        assert_eq!(lines[0], "customerID,Contract,InternetService,MonthlyCharges,Churn");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("C-1,Month-to-month,DSL,"));
    }

    #[test]
    fn test_filtered_view_csv_empty_view_keeps_header() {
        let dataset = read_csv_bytes(CSV).unwrap();
        let view = dataset.filter("Two year").unwrap();

        let lines = export_lines(&filtered_view_csv(&view).unwrap());
        assert_eq!(lines, vec!["customerID,Contract,InternetService,MonthlyCharges,Churn"]);
    }

    #[test]
    fn test_insights_csv() {
        let dataset = read_csv_bytes(CSV).unwrap();
        let view = dataset.filter("Month-to-month").unwrap();
        let contract = grouped_churn_rate(&view, CONTRACT).unwrap();
        let internet = grouped_churn_rate(&view, INTERNET_SERVICE).unwrap();
        let rows = build_insight_export(&contract, &internet);

        let download = insights_csv(&rows).unwrap();
        assert_eq!(download.file_name, "churn_insights.csv");

        let lines = export_lines(&download);
        assert_eq!(lines[0], "Contract,InternetService,No,Yes,Insight");
        assert_eq!(lines.len(), 4);

        let fields: Vec<Vec<&str>> = lines[1..].iter().map(|line| line.split(',').collect()).collect();
        assert_eq!(fields[0][0], "Month-to-month");
        assert_eq!(fields[0][1], "");
        assert_eq!(fields[0][4], "Churn by Contract");
        assert_eq!(fields[1][..2], ["", "DSL"]);
        assert_eq!(fields[2][..2], ["", "Fiber optic"]);

        let rate = |row: usize, col: usize| fields[row][col].parse::<f64>().unwrap();
        assert_eq!((rate(0, 2), rate(0, 3)), (0.5, 0.5));
        assert_eq!((rate(1, 2), rate(1, 3)), (1.0, 0.0));
        assert_eq!((rate(2, 2), rate(2, 3)), (0.0, 1.0));
        assert!(fields[1..]
            .iter()
            .all(|row| row[4] == "Churn by Internet Service"));
    }

    #[test]
    fn test_write_to_directory() {
        let dataset = read_csv_bytes(CSV).unwrap();
        let view = dataset.filter("One year").unwrap();
        let temp_dir = tempdir().unwrap();
        let out_dir = temp_dir.path().join("exports");

        let path = filtered_view_csv(&view).unwrap().write_to(&out_dir).unwrap();
        assert_eq!(path, out_dir.join(FILTERED_EXPORT_NAME));
        assert!(path.exists());
    }
}
