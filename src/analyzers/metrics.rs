use polars::prelude::{IntoLazy, col, len};
use tracing::info;

use super::aggregate::{COUNT, Grid, crosstab, percent_by_row, render_rows};
use super::report::ReportWriter;
use super::types::{DurationSummary, RideMetricsReport};
use super::utility::validate_columns;
use crate::config::AnalysisConfig;
use crate::error::{PipelineError, Result};
use crate::table::{ColumnType, Table};
use crate::transform::TRIP_DURATION;

const REPORT: &str = "ride_metrics";
const DURATION_BUCKET: &str = "duration_bucket";

/// Index of the duration bucket holding `minutes`.
///
/// Buckets are right-closed, the first one also includes its lower edge and
/// the last one is open-ended. Values below the first edge have no bucket.
pub fn duration_bucket(minutes: f64, edges: &[f64]) -> Option<usize> {
    let first = *edges.first()?;
    if minutes.is_nan() || minutes < first {
        return None;
    }
    match edges.iter().skip(1).position(|&upper| minutes <= upper) {
        Some(i) => Some(i),
        None => Some(edges.len() - 1),
    }
}

/// Mean, sample std and count of trip durations per rider class, classes
/// in sorted order. Trips missing either value are skipped.
fn summarize(table: &Table, rider: &str) -> Result<Vec<DurationSummary>> {
    if !table.dtype(TRIP_DURATION).is_some_and(ColumnType::is_numeric) {
        return Err(PipelineError::Conversion {
            column: TRIP_DURATION.to_string(),
            expected: "float".to_string(),
            reason: "trip duration is not numeric".to_string(),
        });
    }

    let frame = table
        .frame()
        .clone()
        .lazy()
        .filter(col(rider).is_not_null().and(col(TRIP_DURATION).is_not_null()))
        .group_by([col(rider)])
        .agg([
            col(TRIP_DURATION).mean().alias("mean"),
            col(TRIP_DURATION).std(1).alias("std"),
            len().alias(COUNT),
        ])
        .collect()?;
    let grouped = Table::from_frame(frame);

    let mut summaries: Vec<DurationSummary> = grouped
        .text(rider)?
        .into_iter()
        .zip(grouped.floats("mean")?)
        .zip(grouped.floats("std")?)
        .zip(grouped.counts(COUNT)?)
        .filter_map(|(((class, mean), std), count)| {
            Some(DurationSummary {
                rider_class: class?,
                mean: mean.unwrap_or(f64::NAN),
                std: std.unwrap_or(f64::NAN),
                count: count as usize,
            })
        })
        .collect();
    summaries.sort_by(|a, b| a.rider_class.cmp(&b.rider_class));
    Ok(summaries)
}

/// Per-class share of trips in each duration bucket.
fn duration_distribution(table: &Table, config: &AnalysisConfig) -> Result<Grid<f64>> {
    let rider = config.rider_column.as_str();
    let buckets: Vec<Option<&str>> = table
        .floats(TRIP_DURATION)?
        .into_iter()
        .map(|m| {
            m.and_then(|m| duration_bucket(m, &config.duration_edges))
                .and_then(|b| config.duration_labels.get(b))
                .map(String::as_str)
        })
        .collect();
    let bucketed = table.project(REPORT, &[rider])?.with_categorical(
        DURATION_BUCKET,
        &buckets,
        &config.duration_labels,
    )?;
    Ok(percent_by_row(&crosstab(&bucketed, rider, DURATION_BUCKET)?))
}

#[tracing::instrument(skip_all)]
pub fn analyze_ride_metrics(
    table: &Table,
    config: &AnalysisConfig,
    writer: &ReportWriter,
) -> Result<RideMetricsReport> {
    let rider = config.rider_column.as_str();
    validate_columns(table, REPORT, &[rider, TRIP_DURATION])?;

    let summaries = summarize(table, rider)?;

    let mean_of = |label: &str| {
        summaries
            .iter()
            .find(|s| s.rider_class == label)
            .map(|s| s.mean)
            .ok_or_else(|| PipelineError::Value(format!("no '{label}' trips to compare")))
    };
    let mean_gap = mean_of(&config.casual_label)? - mean_of(&config.member_label)?;

    let distribution = duration_distribution(table, config)?;

    let header: Vec<String> = [rider, "mean", "std", "count"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|s| {
            vec![
                s.rider_class.clone(),
                format!("{:.2}", s.mean),
                format!("{:.2}", s.std),
                s.count.to_string(),
            ]
        })
        .collect();

    writer.section(
        "Analyze Ride Metrics",
        &format!(
            "Trip duration (minutes) by rider group:\n{}\n\n\
             Duration distribution (% of rider class):\n{}\n\n\
             - Mean difference is {mean_gap:.2} minutes",
            render_rows(&header, &rows),
            distribution.transpose().render(),
        ),
    )?;
    writer.write_grid("trip_duration_dist_pct.csv", &distribution.transpose())?;

    info!(mean_gap, "Ride metrics report written");
    Ok(RideMetricsReport {
        summaries,
        mean_gap,
        distribution,
    })
}
