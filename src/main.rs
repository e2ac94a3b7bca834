//! churnlens: customer churn analytics CLI
//!
//! Loads the dataset, analyses the selected contract type, renders the report
//! and writes the CSV exports.

use anyhow::{Context, Result};
use churnlens::{
    analyze, export, filtered_view_csv, insights_csv, load_dataset, Args, ChartRenderer,
    ConsoleRenderer, ReportRenderer,
};
use clap::Parser;
use std::time::Instant;
use tracing::info;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Logs go to stderr to keep stdout clean for tables and JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(args.log_filter())
        .init();

    if let Err(err) = run(&args) {
        if args.json {
            let body = serde_json::json!({ "error": format!("{:#}", err) });
            eprintln!("{}", serde_json::to_string_pretty(&body)?);
        } else {
            eprintln!("Error: {:#}", err);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let start_time = Instant::now();

    // Step 1: Load the dataset
    let dataset = load_dataset(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    info!(rows = dataset.height(), "dataset loaded");

    let options = dataset.contract_options()?;
    if args.list_contracts {
        for option in &options {
            println!("{}", option);
        }
        return Ok(());
    }

    // Step 2: Analyse the selected contract
    let contract = args.resolve_contract(&options)?;
    let report = analyze(&dataset, &contract)?;

    // Step 3: Render
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        ConsoleRenderer::stdout().render(&report)?;
    }

    if args.charts {
        let mut charts = ChartRenderer::new(&args.output_dir);
        charts
            .render(&report)
            .context("failed to render charts")?;
    }

    // Step 4: Exports
    if !args.no_export {
        let downloads = [
            filtered_view_csv(&report.view)?,
            insights_csv(&report.insights)?,
        ];
        for download in &downloads {
            let path = download
                .write_to(&args.output_dir)
                .with_context(|| format!("failed to write {}", download.file_name))?;
            if !args.json {
                println!("Saved {} ({})", path.display(), export::CSV_MIME);
            }
        }
    }

    info!(
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "pipeline complete"
    );
    Ok(())
}
