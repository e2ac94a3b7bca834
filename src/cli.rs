//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::error::ChurnError;

/// Customer churn analytics: churn rates, grouped breakdowns, correlations and exports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the customer churn CSV file
    #[arg(short, long, default_value = "data/telco_churn.csv")]
    pub input: PathBuf,

    /// Contract type to analyse; defaults to the first contract in the data
    #[arg(short, long)]
    pub contract: Option<String>,

    /// Directory for CSV exports and charts
    #[arg(short, long, default_value = "churn_report")]
    pub output_dir: PathBuf,

    /// Render SVG charts into the output directory
    #[arg(long)]
    pub charts: bool,

    /// Print the report as JSON instead of tables
    #[arg(long)]
    pub json: bool,

    /// Skip writing the CSV exports
    #[arg(long)]
    pub no_export: bool,

    /// Print the available contract types and exit
    #[arg(long)]
    pub list_contracts: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Level for events that no `RUST_LOG` directive matches
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }

    /// Log filter built from `RUST_LOG`, falling back to [`Args::log_level`]
    pub fn log_filter(&self) -> EnvFilter {
        let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        self.log_filter_with(env.as_deref())
    }

    /// `RUST_LOG` directives win; the flag only sets the default level.
    /// Unparsable directives are skipped.
    pub fn log_filter_with(&self, directives: Option<&str>) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.log_level()).into())
            .parse_lossy(directives.unwrap_or_default())
    }

    /// Pick the contract to analyse from the dataset's options.
    ///
    /// An explicit value is used as-is even when absent from the data.
    pub fn resolve_contract(&self, options: &[String]) -> crate::Result<String> {
        if let Some(ref contract) = self.contract {
            if !options.contains(contract) {
                warn!(contract = %contract, ?options, "contract not present in dataset");
            }
            return Ok(contract.clone());
        }

        options
            .first()
            .cloned()
            .ok_or_else(|| ChurnError::empty("no contract values to choose from"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_args(contract: Option<&str>) -> Args {
        Args {
            input: PathBuf::from("test.csv"),
            contract: contract.map(str::to_string),
            output_dir: PathBuf::from("out"),
            charts: false,
            json: false,
            no_export: false,
            list_contracts: false,
            verbose: false,
        }
    }

    #[test]
    fn test_resolve_contract() {
        let options = vec!["Month-to-month".to_string(), "One year".to_string()];

        let args = create_args(None);
        assert_eq!(args.resolve_contract(&options).unwrap(), "Month-to-month");

        let args = create_args(Some("One year"));
        assert_eq!(args.resolve_contract(&options).unwrap(), "One year");

        let args = create_args(Some("Two year"));
        assert_eq!(args.resolve_contract(&options).unwrap(), "Two year");

        let args = create_args(None);
        assert!(args.resolve_contract(&[]).is_err());
    }

    #[test]
    fn test_log_filter_prefers_env_directives() {
        let quiet = create_args(None);
        assert_eq!(
            quiet.log_filter_with(Some("info")).max_level_hint(),
            Some(LevelFilter::INFO)
        );
        assert_eq!(quiet.log_filter_with(None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(quiet.log_filter_with(Some("")).max_level_hint(), Some(LevelFilter::WARN));

        let mut verbose = create_args(None);
        verbose.verbose = true;
        assert_eq!(verbose.log_filter_with(None).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(
            verbose.log_filter_with(Some("error")).max_level_hint(),
            Some(LevelFilter::ERROR)
        );
    }

    #[test]
    fn test_parse_arguments() {
        let args = Args::parse_from([
            "churnlens",
            "--input",
            "telco.csv",
            "-c",
            "Two year",
            "--charts",
            "--json",
        ]);
        assert_eq!(args.input, PathBuf::from("telco.csv"));
        assert_eq!(args.contract.as_deref(), Some("Two year"));
        assert_eq!(args.output_dir, PathBuf::from("churn_report"));
        assert!(args.charts && args.json);
        assert!(!args.no_export);
        assert_eq!(args.log_level(), tracing::Level::WARN);
    }
}
