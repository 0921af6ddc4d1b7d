//! Rider-behaviour reports over the transformed trip table.
//!
//! Five independent reports (segments, usage patterns, ride metrics, bike
//! preferences, station popularity) each validate their columns, aggregate,
//! append a section to `analysis_output.txt` and write their CSV side files.
//! [`run_all`] runs them in that fixed order and keeps going past failures.

pub mod aggregate;
pub mod bikes;
pub mod magnitude;
pub mod metrics;
pub mod report;
pub mod segments;
pub mod stations;
pub mod types;
pub mod usage;
pub mod utility;

use tracing::{error, info};

use crate::config::AnalysisConfig;
use crate::error::{PipelineError, Result};
use crate::table::Table;
use report::ReportWriter;

/// Result of one report within an analysis run.
#[derive(Debug)]
pub struct ReportOutcome {
    pub name: &'static str,
    pub error: Option<PipelineError>,
}

impl ReportOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

fn outcome<T>(name: &'static str, result: Result<T>) -> ReportOutcome {
    let error = result.err();
    if let Some(e) = &error {
        error!(report = name, error = %e, "Report failed");
    }
    ReportOutcome { name, error }
}

/// Runs every report against `table`. A failing report is logged and the
/// remaining ones still run.
#[tracing::instrument(skip_all, fields(records = table.len()))]
pub fn run_all(table: &Table, config: &AnalysisConfig, writer: &ReportWriter) -> Vec<ReportOutcome> {
    let outcomes = vec![
        outcome(
            "rider_segments",
            segments::analyze_rider_segments(table, config, writer),
        ),
        outcome(
            "usage_patterns",
            usage::analyze_usage_patterns(table, config, writer),
        ),
        outcome(
            "ride_metrics",
            metrics::analyze_ride_metrics(table, config, writer),
        ),
        outcome(
            "bike_preferences",
            bikes::analyze_bike_preferences(table, config, writer),
        ),
        outcome(
            "station_popularity",
            stations::analyze_station_popularity(table, config, writer),
        ),
    ];

    let failed = outcomes.iter().filter(|o| !o.succeeded()).count();
    info!(
        dir = %writer.dir().display(),
        reports = outcomes.len(),
        failed,
        "Analysis complete"
    );
    outcomes
}
