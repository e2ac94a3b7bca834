//! Dataset loading, column normalisation and contract filtering using Polars

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::ChurnError;

pub const CONTRACT: &str = "Contract";
pub const INTERNET_SERVICE: &str = "InternetService";
pub const MONTHLY_CHARGES: &str = "MonthlyCharges";
pub const CHURN: &str = "Churn";

/// Columns every dataset must carry after normalisation
pub const REQUIRED_COLUMNS: [&str; 4] = [CONTRACT, INTERNET_SERVICE, MONTHLY_CHARGES, CHURN];

/// The loaded customer dataset, one row per customer
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    /// Wrap a frame, normalising column names and validating required columns.
    ///
    /// Fails with [`ChurnError::EmptyDataset`] if a required column is missing
    /// or the frame has no rows, and with [`ChurnError::DuplicateColumn`] if
    /// two headers normalise to the same name.
    pub fn from_frame(mut frame: DataFrame) -> crate::Result<Self> {
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut normalized = Vec::with_capacity(frame.width());
        for name in frame.get_column_names() {
            let renamed = normalize_column_name(name);
            if let Some(first) = seen.insert(renamed.clone(), name.to_string()) {
                return Err(ChurnError::DuplicateColumn {
                    column: renamed,
                    first,
                    second: name.to_string(),
                });
            }
            normalized.push(renamed);
        }
        frame.set_column_names(normalized)?;

        for required in REQUIRED_COLUMNS {
            if frame.column(required).is_err() {
                return Err(ChurnError::empty(format!(
                    "missing required column `{}`",
                    required
                )));
            }
        }

        if frame.height() == 0 {
            return Err(ChurnError::empty("no customer records"));
        }

        let frame = frame
            .lazy()
            .with_columns([
                col(CONTRACT).cast(DataType::String),
                col(INTERNET_SERVICE).cast(DataType::String),
                col(CHURN).cast(DataType::String),
                col(MONTHLY_CHARGES).cast(DataType::Float64),
            ])
            .collect()?;

        debug!(rows = frame.height(), columns = frame.width(), "dataset validated");
        Ok(Self { frame })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Distinct contract values in order of first appearance
    pub fn contract_options(&self) -> crate::Result<Vec<String>> {
        let mut options: Vec<String> = Vec::new();
        for value in string_values(&self.frame, CONTRACT)?.into_iter().flatten() {
            if !options.contains(&value) {
                options.push(value);
            }
        }
        Ok(options)
    }

    /// Records whose contract equals `contract`.
    ///
    /// A value that matches nothing yields an empty view.
    pub fn filter(&self, contract: &str) -> crate::Result<FilteredView> {
        let frame = self
            .frame
            .clone()
            .lazy()
            .filter(col(CONTRACT).eq(lit(contract)))
            .collect()?;

        debug!(contract, rows = frame.height(), "filtered by contract");
        Ok(FilteredView {
            contract: contract.to_string(),
            frame,
        })
    }
}

/// Subset of a [`Dataset`] restricted to one contract type
#[derive(Debug, Clone)]
pub struct FilteredView {
    contract: String,
    frame: DataFrame,
}

impl FilteredView {
    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }
}

/// Load a customer CSV file with a header row
pub fn load_dataset(path: impl AsRef<Path>) -> crate::Result<Dataset> {
    let path = path.as_ref();
    info!(path = %path.display(), "loading dataset");

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .map_err(no_data_as_empty)?;

    Dataset::from_frame(frame)
}

/// Parse an in-memory CSV payload with a header row
pub fn read_csv_bytes(bytes: &[u8]) -> crate::Result<Dataset> {
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()
        .map_err(no_data_as_empty)?;

    Dataset::from_frame(frame)
}

/// Replace spaces in a header with underscores
pub fn normalize_column_name(name: &str) -> String {
    name.replace(' ', "_")
}

fn no_data_as_empty(err: PolarsError) -> ChurnError {
    match err {
        PolarsError::NoData(msg) => ChurnError::empty(msg.to_string()),
        other => ChurnError::Polars(other),
    }
}

/// Values of a column rendered as strings, nulls preserved
pub(crate) fn string_values(frame: &DataFrame, name: &str) -> crate::Result<Vec<Option<String>>> {
    let column = frame.column(name).map_err(|_| ChurnError::missing(name))?;
    let column = column.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

/// Values of a column as floats, nulls preserved
pub(crate) fn float_values(frame: &DataFrame, name: &str) -> crate::Result<Vec<Option<f64>>> {
    let column = frame.column(name).map_err(|_| ChurnError::missing(name))?;
    let column = column.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

pub(crate) fn require_column(frame: &DataFrame, name: &str) -> crate::Result<()> {
    frame
        .column(name)
        .map(|_| ())
        .map_err(|_| ChurnError::missing(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "customerID,Contract,InternetService,MonthlyCharges,Churn,tenure,Payment Method").unwrap();
        writeln!(file, "7590-VHVEG,Month-to-month,DSL,29.85,No,1,Electronic check").unwrap();
        writeln!(file, "5575-GNVDE,One year,DSL,56.95,No,34,Mailed check").unwrap();
        writeln!(file, "3668-QPYBK,Month-to-month,DSL,53.85,Yes,2,Mailed check").unwrap();
        writeln!(file, "7795-CFOCW,One year,DSL,42.30,No,45,Bank transfer").unwrap();
        writeln!(file, "9237-HQITU,Month-to-month,Fiber optic,70.70,Yes,2,Electronic check").unwrap();
        writeln!(file, "9305-CDSKC,Two year,Fiber optic,99.65,Yes,8,Electronic check").unwrap();
        file
    }

    #[test]
    fn test_load_dataset_normalizes_columns() {
        let test_file = create_test_csv();
        let dataset = load_dataset(test_file.path()).unwrap();

        assert_eq!(dataset.height(), 6);
        let names = dataset.column_names();
        assert!(names.contains(&"Payment_Method".to_string()));
        assert!(names.contains(&"MonthlyCharges".to_string()));
        assert!(!names.iter().any(|name| name.contains(' ')));
    }

    #[test]
    fn test_contract_options_keep_first_appearance_order() {
        let test_file = create_test_csv();
        let dataset = load_dataset(test_file.path()).unwrap();

        assert_eq!(
            dataset.contract_options().unwrap(),
            vec!["Month-to-month", "One year", "Two year"]
        );
    }

    #[test]
    fn test_filter_by_contract() {
        let test_file = create_test_csv();
        let dataset = load_dataset(test_file.path()).unwrap();

        let view = dataset.filter("Month-to-month").unwrap();
        assert_eq!(view.height(), 3);
        assert_eq!(view.contract(), "Month-to-month");
        let contracts = string_values(view.frame(), CONTRACT).unwrap();
        assert!(contracts
            .iter()
            .all(|value| value.as_deref() == Some("Month-to-month")));
    }

    #[test]
    fn test_filter_unknown_contract_is_empty() {
        let test_file = create_test_csv();
        let dataset = load_dataset(test_file.path()).unwrap();

        let view = dataset.filter("Lifetime").unwrap();
        assert!(view.is_empty());
    }

    #[test]
    fn test_missing_required_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Contract,InternetService,Churn").unwrap();
        writeln!(file, "Month-to-month,DSL,No").unwrap();

        let err = load_dataset(file.path()).unwrap_err();
        assert!(matches!(err, ChurnError::EmptyDataset { .. }));
        assert!(err.to_string().contains("MonthlyCharges"));
    }

    #[test]
    fn test_header_only_file_is_empty_dataset() {
        let err = read_csv_bytes(b"Contract,InternetService,MonthlyCharges,Churn\n").unwrap_err();
        assert!(matches!(err, ChurnError::EmptyDataset { .. }));
    }

    #[test]
    fn test_headers_colliding_after_normalisation() {
        let err = read_csv_bytes(
            b"Contract,InternetService,MonthlyCharges,Churn,Total Charges,Total_Charges\n\
              One year,DSL,20,No,20,20\n",
        )
        .unwrap_err();

        match err {
            ChurnError::DuplicateColumn {
                column,
                first,
                second,
            } => {
                assert_eq!(column, "Total_Charges");
                assert_eq!(first, "Total Charges");
                assert_eq!(second, "Total_Charges");
            }
            other => panic!("expected DuplicateColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_monthly_charges_cast_to_float() {
        let dataset = read_csv_bytes(
            b"Contract,InternetService,MonthlyCharges,Churn\nOne year,DSL,20,No\nOne year,No,25,Yes\n",
        )
        .unwrap();

        let charges = float_values(dataset.frame(), MONTHLY_CHARGES).unwrap();
        assert_eq!(charges, vec![Some(20.0), Some(25.0)]);
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("Monthly Charges"), "Monthly_Charges");
        assert_eq!(normalize_column_name("Churn"), "Churn");
        assert_eq!(normalize_column_name("a b c"), "a_b_c");
    }
}
