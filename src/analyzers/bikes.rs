use tracing::info;

use super::aggregate::{crosstab, percent_by_row};
use super::report::ReportWriter;
use super::types::BikePreferenceReport;
use super::utility::validate_columns;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::table::Table;

pub const RIDEABLE_TYPE: &str = "rideable_type";

const REPORT: &str = "bike_preferences";

/// Vehicle types chosen by each rider class, as counts and row percentages.
#[tracing::instrument(skip_all)]
pub fn analyze_bike_preferences(
    table: &Table,
    config: &AnalysisConfig,
    writer: &ReportWriter,
) -> Result<BikePreferenceReport> {
    validate_columns(table, REPORT, &[config.rider_column.as_str(), RIDEABLE_TYPE])?;

    let counts = crosstab(table, &config.rider_column, RIDEABLE_TYPE)?;
    let percentages = percent_by_row(&counts);

    writer.section(
        "Analyze Bike Preferences",
        &format!(
            "Bike type counts:\n{}\n\nBike type preference (% of rider class):\n{}",
            counts.render(),
            percentages.render()
        ),
    )?;
    writer.write_grid("bike_preference_counts.csv", &counts)?;
    writer.write_grid("bike_preference_pct.csv", &percentages)?;

    info!(types = counts.columns.len(), "Bike preference report written");
    Ok(BikePreferenceReport {
        counts,
        percentages,
    })
}
