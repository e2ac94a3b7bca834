//! Report renderers: console tables and SVG charts drawn with Plotters

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use plotters::element::Pie;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::{debug, info};

use crate::analytics::{ChargesBoxSummary, CorrelationMatrix, GroupedCounts, GroupedRateTable};
use crate::report::ChurnReport;

/// Color palette for categories and series
const SERIES_COLORS: [RGBColor; 5] = [
    RGBColor(31, 119, 180),
    RGBColor(214, 39, 40),
    RGBColor(44, 160, 44),
    RGBColor(255, 127, 14),
    RGBColor(148, 103, 189),
];

const NEGATIVE: RGBColor = RGBColor(33, 102, 172);
const NEUTRAL: RGBColor = RGBColor(247, 247, 247);
const POSITIVE: RGBColor = RGBColor(178, 24, 43);
const UNDEFINED: RGBColor = RGBColor(200, 200, 200);

pub const CHURN_BREAKDOWN_CHART: &str = "churn_breakdown.svg";
pub const CHURN_DISTRIBUTION_CHART: &str = "churn_distribution.svg";
pub const INTERNET_COUNTS_CHART: &str = "churn_by_internet_service.svg";
pub const CONTRACT_RATE_CHART: &str = "churn_rate_by_contract.svg";
pub const INTERNET_RATE_CHART: &str = "churn_rate_by_internet_service.svg";
pub const MONTHLY_CHARGES_CHART: &str = "monthly_charges_vs_churn.svg";
pub const CORRELATION_CHART: &str = "correlation_heatmap.svg";

/// Consumer of a computed report: draws it, prints it, or ships it elsewhere
pub trait ReportRenderer {
    fn render(&mut self, report: &ChurnReport) -> crate::Result<()>;
}

/// Prints the report as plain-text tables
pub struct ConsoleRenderer<W: Write> {
    out: W,
}

impl ConsoleRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn rate_table(&mut self, title: &str, table: &GroupedRateTable) -> io::Result<()> {
        writeln!(self.out, "\n=== {} ===", title)?;
        if table.is_empty() {
            writeln!(self.out, "  (no records)")?;
            return Ok(());
        }
        write!(self.out, "  {:<20}", table.group_column)?;
        for label in &table.labels {
            write!(self.out, " | {:>8}", label)?;
        }
        writeln!(self.out)?;
        for row in &table.rows {
            write!(self.out, "  {:<20}", row.key)?;
            for label in &table.labels {
                write!(self.out, " | {:>8.4}", row.rate(label))?;
            }
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn count_table(&mut self, counts: &GroupedCounts) -> io::Result<()> {
        writeln!(self.out, "\n=== Churn by Internet Service Type ===")?;
        if counts.is_empty() {
            writeln!(self.out, "  (no records)")?;
            return Ok(());
        }
        write!(self.out, "  {:<20}", counts.group_column)?;
        for split in &counts.splits {
            write!(self.out, " | {:>8}", split)?;
        }
        writeln!(self.out)?;
        for (group, row) in counts.groups.iter().zip(counts.counts.outer_iter()) {
            write!(self.out, "  {:<20}", group)?;
            for count in row.iter() {
                write!(self.out, " | {:>8}", count)?;
            }
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn box_table(&mut self, summary: &ChargesBoxSummary) -> io::Result<()> {
        writeln!(self.out, "\n=== {} vs Churn ===", summary.value_column)?;
        if summary.groups.is_empty() {
            writeln!(self.out, "  (no records)")?;
            return Ok(());
        }
        writeln!(
            self.out,
            "  Churn | Count |    Min |     Q1 | Median |     Q3 |    Max"
        )?;
        for stats in &summary.groups {
            writeln!(
                self.out,
                "  {:<5} | {:>5} | {:>6.2} | {:>6.2} | {:>6.2} | {:>6.2} | {:>6.2}",
                stats.label, stats.count, stats.min, stats.q1, stats.median, stats.q3, stats.max
            )?;
        }
        Ok(())
    }

    fn correlation_table(&mut self, matrix: &CorrelationMatrix) -> io::Result<()> {
        writeln!(self.out, "\n=== Correlation Matrix ===")?;
        write!(self.out, "  {:<16}", "")?;
        for name in &matrix.columns {
            write!(self.out, " {:>16}", name)?;
        }
        writeln!(self.out)?;
        for (name, row) in matrix.columns.iter().zip(matrix.values.outer_iter()) {
            write!(self.out, "  {:<16}", name)?;
            for value in row.iter() {
                if value.is_nan() {
                    write!(self.out, " {:>16}", "NaN")?;
                } else {
                    write!(self.out, " {:>16.3}", value)?;
                }
            }
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn write_report(&mut self, report: &ChurnReport) -> io::Result<()> {
        writeln!(self.out, "=== Churn Summary ===")?;
        writeln!(self.out, "Churn breakdown:")?;
        for (label, count) in &report.summary.counts {
            writeln!(self.out, "  {:<5} {}", label, count)?;
        }
        writeln!(self.out, "Churn rate: {:.2}%", report.summary.rate * 100.0)?;

        writeln!(
            self.out,
            "\nShowing results for {} contract ({} customers)",
            report.contract, report.filtered_rows
        )?;

        self.count_table(&report.internet_counts)?;
        self.box_table(&report.monthly_charges)?;
        self.rate_table("Churn Rate by Contract Type", &report.contract_rates)?;
        self.rate_table("Churn Rate by Internet Service", &report.internet_rates)?;
        self.correlation_table(&report.correlation)?;
        self.out.flush()
    }
}

impl<W: Write> ReportRenderer for ConsoleRenderer<W> {
    fn render(&mut self, report: &ChurnReport) -> crate::Result<()> {
        self.write_report(report)?;
        Ok(())
    }
}

/// Writes one SVG per chart into an output directory
pub struct ChartRenderer {
    output_dir: PathBuf,
    written: Vec<PathBuf>,
}

impl ChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            written: Vec::new(),
        }
    }

    /// Chart files produced so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn target(&mut self, file_name: &str) -> PathBuf {
        let path = self.output_dir.join(file_name);
        self.written.push(path.clone());
        path
    }
}

impl ReportRenderer for ChartRenderer {
    fn render(&mut self, report: &ChurnReport) -> crate::Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;

        let labels: Vec<String> = report.summary.counts.keys().cloned().collect();
        let counts: Vec<f64> = report.summary.counts.values().map(|&c| c as f64).collect();
        let path = self.target(CHURN_BREAKDOWN_CHART);
        draw_bar_chart(&path, "Churn Breakdown", "Churn", "Customers", &labels, &counts, None)?;

        let path = self.target(CHURN_DISTRIBUTION_CHART);
        draw_pie_chart(&path, "Churn Distribution", &labels, &counts)?;

        let path = self.target(INTERNET_COUNTS_CHART);
        draw_grouped_counts(&path, "Churn by Internet Service Type", &report.internet_counts)?;

        let path = self.target(CONTRACT_RATE_CHART);
        draw_rate_chart(&path, "Churn Rate by Contract Type", &report.contract_rates)?;

        let path = self.target(INTERNET_RATE_CHART);
        draw_rate_chart(&path, "Churn Rate by Internet Service", &report.internet_rates)?;

        let path = self.target(MONTHLY_CHARGES_CHART);
        draw_box_plot(&path, "Monthly Charges vs Churn", &report.monthly_charges)?;

        let path = self.target(CORRELATION_CHART);
        draw_heatmap(&path, "Correlation Heatmap", &report.correlation)?;

        info!(
            charts = self.written.len(),
            dir = %self.output_dir.display(),
            "charts rendered"
        );
        Ok(())
    }
}

/// Axis label for a category index placed at integer x positions
fn category_label(labels: &[String], x: f64) -> String {
    let index = x.round();
    if (x - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    labels.get(index as usize).cloned().unwrap_or_default()
}

/// Diverging blue-white-red color for a correlation in [-1, 1]
pub fn diverging_color(value: f64) -> RGBColor {
    if value.is_nan() {
        return UNDEFINED;
    }
    let value = value.clamp(-1.0, 1.0);
    let (from, to, t) = if value < 0.0 {
        (NEUTRAL, NEGATIVE, -value)
    } else {
        (NEUTRAL, POSITIVE, value)
    };
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}

/// Bar per category; `y_max` defaults to the tallest bar plus headroom
fn draw_bar_chart(
    path: &Path,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    labels: &[String],
    values: &[f64],
    y_max: Option<f64>,
) -> crate::Result<()> {
    let tallest = values.iter().cloned().fold(0.0, f64::max);
    let y_max = y_max.unwrap_or(if tallest > 0.0 { tallest * 1.1 } else { 1.0 });
    let n = labels.len().max(1) as f64;

    let root = SVGBackend::new(path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n - 0.5), 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len().max(1))
        .x_label_formatter(&|x| category_label(labels, *x))
        .x_desc(x_desc)
        .y_desc(y_desc)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(i, &value)| {
        let color = SERIES_COLORS[i % SERIES_COLORS.len()];
        Rectangle::new(
            [(i as f64 - 0.4, 0.0), (i as f64 + 0.4, value)],
            color.filled(),
        )
    }))?;

    root.present()?;
    debug!(path = %path.display(), bars = values.len(), "bar chart saved");
    Ok(())
}

/// Share of each label as a pie slice
fn draw_pie_chart(path: &Path, title: &str, labels: &[String], values: &[f64]) -> crate::Result<()> {
    let root = SVGBackend::new(path, (600, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    let area = root.titled(title, ("sans-serif", 28))?;

    // A pie needs at least one non-empty slice
    if values.iter().sum::<f64>() > 0.0 {
        let (width, height) = area.dim_in_pixel();
        let center = (width as i32 / 2, height as i32 / 2);
        let radius = f64::from(width.min(height)) * 0.35;
        let colors: Vec<RGBColor> = (0..values.len())
            .map(|i| SERIES_COLORS[i % SERIES_COLORS.len()])
            .collect();

        let mut pie = Pie::new(&center, &radius, values, &colors, labels);
        pie.start_angle(-90.0);
        pie.label_style(("sans-serif", 18).into_font().color(&BLACK));
        pie.percentages(("sans-serif", 16).into_font().color(&WHITE));
        area.draw(&pie)?;
    }

    root.present()?;
    debug!(path = %path.display(), slices = values.len(), "pie chart saved");
    Ok(())
}

fn draw_rate_chart(path: &Path, title: &str, table: &GroupedRateTable) -> crate::Result<()> {
    let labels: Vec<String> = table.rows.iter().map(|row| row.key.clone()).collect();
    let rates: Vec<f64> = table.rows.iter().map(|row| row.churn_rate()).collect();
    draw_bar_chart(
        path,
        title,
        &table.group_column,
        "Churn Rate",
        &labels,
        &rates,
        Some(1.0),
    )
}

/// Side-by-side bars per group, one series per split value
fn draw_grouped_counts(path: &Path, title: &str, counts: &GroupedCounts) -> crate::Result<()> {
    let tallest = counts.counts.iter().copied().max().unwrap_or(0) as f64;
    let y_max = if tallest > 0.0 { tallest * 1.1 } else { 1.0 };
    let n = counts.groups.len().max(1) as f64;

    let root = SVGBackend::new(path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n - 0.5), 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(counts.groups.len().max(1))
        .x_label_formatter(&|x| category_label(&counts.groups, *x))
        .x_desc(counts.group_column.as_str())
        .y_desc("Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let width = 0.8 / counts.splits.len().max(1) as f64;
    for (s, split) in counts.splits.iter().enumerate() {
        let color = SERIES_COLORS[s % SERIES_COLORS.len()];
        chart
            .draw_series(counts.counts.column(s).iter().enumerate().map(|(g, &count)| {
                let left = g as f64 - 0.4 + s as f64 * width;
                Rectangle::new([(left, 0.0), (left + width, count as f64)], color.filled())
            }))?
            .label(split.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    if !counts.splits.is_empty() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

fn draw_box_plot(path: &Path, title: &str, summary: &ChargesBoxSummary) -> crate::Result<()> {
    let labels: Vec<String> = summary.groups.iter().map(|g| g.label.clone()).collect();
    let low = summary.groups.iter().map(|g| g.min).fold(f64::INFINITY, f64::min);
    let high = summary.groups.iter().map(|g| g.max).fold(f64::NEG_INFINITY, f64::max);
    let (y_min, y_max) = if low.is_finite() && high.is_finite() {
        let pad = ((high - low) * 0.1).max(1.0);
        (low - pad, high + pad)
    } else {
        (0.0, 1.0)
    };
    let n = labels.len().max(1) as f64;

    let root = SVGBackend::new(path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n - 0.5), y_min..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len().max(1))
        .x_label_formatter(&|x| category_label(&labels, *x))
        .x_desc("Churn")
        .y_desc(summary.value_column.as_str())
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (i, stats) in summary.groups.iter().enumerate() {
        let x = i as f64;
        let color = SERIES_COLORS[i % SERIES_COLORS.len()];

        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - 0.25, stats.q1), (x + 0.25, stats.q3)],
            color.mix(0.3).filled(),
        )))?;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - 0.25, stats.q1), (x + 0.25, stats.q3)],
            color.stroke_width(2),
        )))?;

        let whiskers = [
            vec![(x - 0.25, stats.median), (x + 0.25, stats.median)],
            vec![(x, stats.min), (x, stats.q1)],
            vec![(x, stats.q3), (x, stats.max)],
            vec![(x - 0.1, stats.min), (x + 0.1, stats.min)],
            vec![(x - 0.1, stats.max), (x + 0.1, stats.max)],
        ];
        chart.draw_series(
            whiskers
                .into_iter()
                .map(|points| PathElement::new(points, color.stroke_width(2))),
        )?;
    }

    root.present()?;
    Ok(())
}

fn draw_heatmap(path: &Path, title: &str, matrix: &CorrelationMatrix) -> crate::Result<()> {
    let n = matrix.len();
    let extent = n.max(1) as f64;

    let root = SVGBackend::new(path, (800, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(120)
        .build_cartesian_2d(-0.5f64..(extent - 0.5), -0.5f64..(extent - 0.5))?;

    // Row 0 is drawn at the top
    let flipped = |y: f64| (n as f64 - 1.0) - y;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n.max(1))
        .y_labels(n.max(1))
        .x_label_formatter(&|x| category_label(&matrix.columns, *x))
        .y_label_formatter(&|y| category_label(&matrix.columns, flipped(*y)))
        .draw()?;

    let cells = matrix.values.indexed_iter().map(|((i, j), &value)| {
        let (x, y) = (j as f64, flipped(i as f64));
        Rectangle::new(
            [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
            diverging_color(value).filled(),
        )
    });
    chart.draw_series(cells)?;

    let centered = TextStyle::from(("sans-serif", 14).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    let annotations = matrix.values.indexed_iter().map(|((i, j), &value)| {
        let text = if value.is_nan() {
            "NaN".to_string()
        } else {
            format!("{:.2}", value)
        };
        Text::new(text, (j as f64, flipped(i as f64)), centered.clone())
    });
    chart.draw_series(annotations)?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::read_csv_bytes;
    use crate::report::analyze;
    use tempfile::tempdir;

    const CSV: &[u8] = b"customerID,Contract,InternetService,MonthlyCharges,Churn,tenure
C-1,Month-to-month,DSL,29.85,No,1
C-2,Month-to-month,Fiber optic,70.70,Yes,2
C-3,Month-to-month,Fiber optic,99.65,Yes,8
C-4,Month-to-month,No,20.05,No,30
C-5,One year,DSL,56.95,No,34
";

    fn create_test_report(contract: &str) -> ChurnReport {
        let dataset = read_csv_bytes(CSV).unwrap();
        analyze(&dataset, contract).unwrap()
    }

    #[test]
    fn test_console_renderer() {
        let report = create_test_report("Month-to-month");
        let mut renderer = ConsoleRenderer::new(Vec::new());
        renderer.render(&report).unwrap();

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.contains("Churn rate: 40.00%"));
        assert!(output.contains("Showing results for Month-to-month contract (4 customers)"));
        assert!(output.contains("Churn Rate by Internet Service"));
        assert!(output.contains("Fiber optic"));
    }

    #[test]
    fn test_console_renderer_empty_selection() {
        let report = create_test_report("Two year");
        let mut renderer = ConsoleRenderer::new(Vec::new());
        renderer.render(&report).unwrap();

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.contains("(no records)"));
        assert!(output.contains("NaN"));
    }

    #[test]
    fn test_chart_renderer_writes_all_charts() {
        let report = create_test_report("Month-to-month");
        let temp_dir = tempdir().unwrap();

        let mut renderer = ChartRenderer::new(temp_dir.path().join("charts"));
        renderer.render(&report).unwrap();

        assert_eq!(renderer.written().len(), 7);
        assert!(renderer
            .written()
            .contains(&temp_dir.path().join("charts").join(CHURN_DISTRIBUTION_CHART)));
        for path in renderer.written() {
            assert!(path.exists(), "missing chart {}", path.display());
        }
    }

    #[test]
    fn test_chart_renderer_empty_selection() {
        let report = create_test_report("Two year");
        let temp_dir = tempdir().unwrap();

        let mut renderer = ChartRenderer::new(temp_dir.path());
        let result = renderer.render(&report);
        assert!(result.is_ok());
        assert!(temp_dir.path().join(CORRELATION_CHART).exists());
    }

    #[test]
    fn test_pie_chart_of_churn_counts() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join(CHURN_DISTRIBUTION_CHART);
        let labels = vec!["No".to_string(), "Yes".to_string()];

        draw_pie_chart(&path, "Churn Distribution", &labels, &[3.0, 2.0]).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("Churn Distribution"));
        assert!(svg.contains("Yes"));
    }

    #[test]
    fn test_pie_chart_without_records_is_blank() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join(CHURN_DISTRIBUTION_CHART);

        draw_pie_chart(&path, "Churn Distribution", &[], &[]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_diverging_color() {
        assert_eq!(diverging_color(0.0), NEUTRAL);
        assert_eq!(diverging_color(1.0), POSITIVE);
        assert_eq!(diverging_color(-1.0), NEGATIVE);
        assert_eq!(diverging_color(f64::NAN), UNDEFINED);
        assert_eq!(diverging_color(3.0), POSITIVE);
    }

    #[test]
    fn test_category_label() {
        let labels = vec!["No".to_string(), "Yes".to_string()];
        assert_eq!(category_label(&labels, 0.0), "No");
        assert_eq!(category_label(&labels, 1.0), "Yes");
        assert_eq!(category_label(&labels, 0.5), "");
        assert_eq!(category_label(&labels, 2.0), "");
        assert_eq!(category_label(&labels, -1.0), "");
    }
}
