//! End-to-end drivers tying the stages together.

use std::path::Path;

use tracing::{info, warn};

use crate::acquire::Acquirer;
use crate::analyzers::report::ReportWriter;
use crate::analyzers::{ReportOutcome, run_all};
use crate::clean::clean;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::integrate::integrate;
use crate::output::{print_json, read_table, write_record, write_table};
use crate::stats::QualityReport;
use crate::table::{Table, datetime};
use crate::transform::{DAY_OF_WEEK, ENDED_AT, MONTH, STARTED_AT, transform};

/// Acquires, integrates, cleans and transforms every configured source, then
/// saves the cleaned table and the quality report under `processed_dir`.
///
/// Returns the transformed table together with the merged stage statistics.
#[tracing::instrument(skip_all, fields(sources = config.sources.len(), gzip = gzip))]
pub async fn process_and_save<A: Acquirer + ?Sized>(
    acquirer: &A,
    config: &PipelineConfig,
    gzip: bool,
) -> Result<(Table, QualityReport)> {
    config.validate()?;
    let (integrated, integration_stats) = integrate(
        acquirer,
        &config.sources,
        &config.id_column,
        &config.metadata_path(),
    )
    .await?;

    let (cleaned, cleaning_stats) = clean(&integrated, config)?;
    let (transformed, transformation_stats) = transform(&cleaned, config)?;

    let data_path = config.cleaned_data_path(gzip);
    write_table(&data_path, &transformed, gzip)?;

    let report = QualityReport::new(integration_stats, cleaning_stats, transformation_stats);
    write_record(&config.quality_report_path(), &report)?;
    print_json(&report)?;

    info!(
        records = transformed.len(),
        retention = report.data_retention.after_transformation.retention_percentage,
        path = %data_path.display(),
        "Processing complete"
    );
    Ok((transformed, report))
}

/// Reads a cleaned table written by [`process_and_save`] and restores the
/// column types CSV cannot carry: timestamps and the calendar-ordered
/// weekday and month categories.
pub fn load_cleaned(path: &Path, config: &PipelineConfig) -> Result<Table> {
    let mut table = read_table(path)?;
    if table.is_empty() {
        return Err(PipelineError::EmptyInput(path.display().to_string()));
    }

    for name in [STARTED_AT, ENDED_AT] {
        if !table.has_column(name) {
            continue;
        }
        let (parsed, failures) = datetime::parse_series(table.series(name)?)?;
        if failures > 0 {
            warn!(column = name, failures, "Unparseable timestamps in cleaned data");
        }
        table = table.with_series(parsed)?;
    }

    for (name, levels) in [(DAY_OF_WEEK, &config.day_names), (MONTH, &config.month_names)] {
        if !table.has_column(name) {
            continue;
        }
        let values = table.text(name)?;
        table = table.with_categorical(name, &values, levels)?;
    }

    info!(path = %path.display(), records = table.len(), "Cleaned data loaded");
    Ok(table)
}

/// Runs the five analysis reports on the cleaned table at `input`, writing
/// everything to `analysis_dir`.
///
/// # Errors
///
/// `Configuration` for an invalid config. `NotFound` / `EmptyInput` when `input` is missing or empty. Failures of
/// individual reports are returned in the outcomes instead.
#[tracing::instrument(skip_all, fields(input = %input.display()))]
pub fn run_analysis(config: &PipelineConfig, input: &Path) -> Result<Vec<ReportOutcome>> {
    config.validate()?;
    let table = load_cleaned(input, config)?;
    let writer = ReportWriter::create(&config.analysis_dir)?;
    Ok(run_all(&table, &config.analysis, &writer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrate::tests::FakeAcquirer;

    const JAN: &str = "\
ride_id,rideable_type,started_at,ended_at,start_station_name,end_station_name,start_lat,start_lng,end_lat,end_lng,member_casual
R1,classic_bike,2024-01-08 08:00:00,2024-01-08 08:12:00,Canal St,Wells St,41.88,-87.64,41.89,-87.63,member
R2,electric_bike,2024-01-13 14:00:00,2024-01-13 14:45:30.250,Lake Shore,Canal St,41.92,-87.63,41.88,-87.64,casual
R3,classic_bike,2024-01-09 18:00:00,2024-01-09 18:00:00,Canal St,Wells St,41.88,-87.64,41.89,-87.63,member
";

    const FEB: &str = "\
ride_id,rideable_type,started_at,ended_at,start_station_name,end_station_name,start_lat,start_lng,end_lat,end_lng,member_casual
R4,classic_bike,2024-02-05 22:30:00,2024-02-05 22:50:00,Wells St,Canal St,41.89,-87.63,41.88,-87.64,member
R5,electric_bike,2024-02-10 10:00:00,2024-02-10 11:30:00,Lake Shore,Lake Shore,41.92,-87.63,41.92,-87.63,casual
";

    fn config(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            sources: vec!["jan.zip".to_string(), "feb.zip".to_string()],
            processed_dir: dir.join("processed"),
            analysis_dir: dir.join("analysis"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_process_then_analyze() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let acquirer = FakeAcquirer::new(&[("jan.zip", JAN), ("feb.zip", FEB)]);

        let (table, report) = process_and_save(&acquirer, &config, false).await.unwrap();
        // R3 has zero duration
        assert_eq!(table.len(), 4);
        assert_eq!(report.data_retention.initial_records, 5);
        assert_eq!(report.data_retention.after_transformation.retention_percentage, 80.0);
        assert!(config.quality_report_path().exists());
        assert!(config.metadata_path().exists());

        let outcomes = run_analysis(&config, &config.cleaned_data_path(false)).unwrap();
        assert!(outcomes.iter().all(|o| o.succeeded()), "{outcomes:?}");
        assert!(config.analysis_dir.join("usage_patterns_stats.csv").exists());
    }

    #[tokio::test]
    async fn test_gzip_output_round_trips_types() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let acquirer = FakeAcquirer::new(&[("jan.zip", JAN), ("feb.zip", FEB)]);

        process_and_save(&acquirer, &config, true).await.unwrap();
        let table = load_cleaned(&config.cleaned_data_path(true), &config).unwrap();

        assert!(table.datetimes(STARTED_AT).unwrap().is_some());
        let months = table.levels(MONTH).unwrap();
        assert_eq!(months[0], "January");
        assert_eq!(months.len(), 12);
    }

    #[test]
    fn test_missing_and_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let missing = run_analysis(&config, &dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(missing, PipelineError::NotFound(_)));

        let empty = dir.path().join("empty.csv");
        std::fs::write(&empty, "").unwrap();
        let err = run_analysis(&config, &empty).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput(_)));

        let header_only = dir.path().join("header.csv");
        std::fs::write(&header_only, "ride_id,member_casual\n").unwrap();
        let err = run_analysis(&config, &header_only).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput(_)));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_work() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.day_names.truncate(3);
        let acquirer = FakeAcquirer::new(&[("jan.zip", JAN), ("feb.zip", FEB)]);

        let err = process_and_save(&acquirer, &config, false).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(!config.metadata_path().exists());

        let err = run_analysis(&config, &dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
