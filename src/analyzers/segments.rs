use tracing::info;

use super::aggregate::{percent_split, render_rows, value_counts};
use super::report::ReportWriter;
use super::types::{SegmentReport, SegmentShare};
use super::utility::validate_columns;
use crate::config::AnalysisConfig;
use crate::error::Result;

const REPORT: &str = "rider_segments";

/// Split of trips between rider classes.
#[tracing::instrument(skip_all)]
pub fn analyze_rider_segments(
    table: &crate::table::Table,
    config: &AnalysisConfig,
    writer: &ReportWriter,
) -> Result<SegmentReport> {
    let rider = config.rider_column.as_str();
    validate_columns(table, REPORT, &[rider])?;

    let counts = value_counts(table, rider)?;
    let shares: Vec<SegmentShare> = counts
        .iter()
        .zip(percent_split(&counts))
        .map(|((class, trips), (_, percent))| SegmentShare {
            rider_class: class.clone(),
            trips: *trips,
            percent,
        })
        .collect();

    let header = vec![rider.to_string(), "count".to_string()];
    let count_rows: Vec<Vec<String>> = shares
        .iter()
        .map(|s| vec![s.rider_class.clone(), s.trips.to_string()])
        .collect();
    let pct_rows: Vec<Vec<String>> = shares
        .iter()
        .map(|s| vec![s.rider_class.clone(), format!("{:.2}", s.percent)])
        .collect();
    let pct_header = vec![rider.to_string(), "percent".to_string()];

    writer.section(
        "Analyze Rider Segments",
        &format!(
            "Total rides by rider group:\n{}\n\nPercentage distribution:\n{}",
            render_rows(&header, &count_rows),
            render_rows(&pct_header, &pct_rows),
        ),
    )?;
    writer.write_rows("trips_by_rider_group.csv", &header, &count_rows)?;
    writer.write_rows("rider_group_distribution.csv", &pct_header, &pct_rows)?;

    info!(classes = shares.len(), "Rider segment report written");
    Ok(SegmentReport { shares })
}
