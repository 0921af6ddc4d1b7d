//! Integrator: concatenates the per-source tables into one unified table.

use std::path::Path;
use tracing::{error, info};

use crate::acquire::{Acquirer, source_name};
use crate::error::{PipelineError, Result};
use crate::output::write_record;
use crate::stats::{DataStructure, IntegrationStats};
use crate::table::Table;

/// Acquires every source in order and stacks the results.
///
/// A failing source is logged, listed in `files_with_errors` and skipped.
/// The structural summary of the unified table is written to
/// `metadata_path` as a one-row CSV.
///
/// # Errors
///
/// `Configuration` if `sources` is empty, `Integration` if every source fails.
#[tracing::instrument(skip_all, fields(sources = sources.len()))]
pub async fn integrate<A: Acquirer + ?Sized>(
    acquirer: &A,
    sources: &[String],
    id_column: &str,
    metadata_path: &Path,
) -> Result<(Table, IntegrationStats)> {
    if sources.is_empty() {
        return Err(PipelineError::Configuration(
            "no sources provided".to_string(),
        ));
    }

    let mut stats = IntegrationStats::default();
    let mut tables = Vec::with_capacity(sources.len());

    for source in sources {
        let name = source_name(source);
        match acquirer.acquire(source).await {
            Ok(table) => {
                info!(source = %name, records = table.len(), "Source integrated");
                stats.files_processed += 1;
                stats.total_records += table.len();
                tables.push(table);
            }
            Err(e) => {
                error!(source = %name, error = %e, "Source failed, skipping");
                stats.files_with_errors.push(name);
            }
        }
    }

    if tables.is_empty() {
        return Err(PipelineError::Integration(format!(
            "all {} sources failed",
            sources.len()
        )));
    }

    let merged = Table::concat(tables)?;
    stats.data_structure = DataStructure::describe(&merged, id_column);
    write_record(metadata_path, &stats.data_structure)?;

    info!(
        files_processed = stats.files_processed,
        failed = stats.files_with_errors.len(),
        records = merged.len(),
        columns = merged.width(),
        "Integration complete"
    );
    Ok((merged, stats))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// In-memory acquirer keyed by source string; unknown sources fail.
    pub(crate) struct FakeAcquirer(pub HashMap<String, String>);

    impl FakeAcquirer {
        pub(crate) fn new(sources: &[(&str, &str)]) -> Self {
            Self(
                sources
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl Acquirer for FakeAcquirer {
        async fn acquire(&self, source: &str) -> Result<Table> {
            match self.0.get(source) {
                Some(csv) => Table::from_csv_reader(csv.as_bytes()),
                None => Err(PipelineError::acquisition(source, "404 Not Found")),
            }
        }
    }

    fn sources(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_integrate_concatenates_in_source_order() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = FakeAcquirer::new(&[
            ("jan.zip", "ride_id,member_casual\nA,member\nB,casual\n"),
            ("feb.zip", "ride_id,member_casual\nC,member\n"),
        ]);
        let meta = dir.path().join("initial_data_structure.csv");

        let (table, stats) = integrate(&acquirer, &sources(&["jan.zip", "feb.zip"]), "ride_id", &meta)
            .await
            .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.text("ride_id").unwrap()[2].as_deref(), Some("C"));
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.data_structure.total_records, 3);
        assert_eq!(stats.data_structure.unique_identifiers, vec!["ride_id"]);
        assert!(meta.exists());
    }

    #[tokio::test]
    async fn test_integrate_skips_failed_sources() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = FakeAcquirer::new(&[("ok.zip", "ride_id\nA\n")]);

        let (table, stats) = integrate(
            &acquirer,
            &sources(&["https://host/missing.zip", "ok.zip"]),
            "ride_id",
            &dir.path().join("meta.csv"),
        )
        .await
        .unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(stats.files_processed, 1);
        assert_eq!(stats.files_with_errors, vec!["missing.zip"]);
    }

    #[tokio::test]
    async fn test_integrate_all_failed_is_integration_error() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = FakeAcquirer::new(&[]);

        let err = integrate(&acquirer, &sources(&["a.zip", "b.zip"]), "ride_id", &dir.path().join("m.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Integration(_)));
    }

    #[tokio::test]
    async fn test_integrate_no_sources_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = FakeAcquirer::new(&[]);

        let err = integrate(&acquirer, &[], "ride_id", &dir.path().join("m.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_integrate_unions_differing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = FakeAcquirer::new(&[
            ("old.zip", "ride_id,start_lat\nA,41\n"),
            ("new.zip", "ride_id,start_lat,rideable_type\nB,41.5,classic_bike\n"),
        ]);

        let (table, stats) = integrate(
            &acquirer,
            &sources(&["old.zip", "new.zip"]),
            "ride_id",
            &dir.path().join("m.csv"),
        )
        .await
        .unwrap();

        assert_eq!(table.column_names(), vec!["ride_id", "start_lat", "rideable_type"]);
        assert_eq!(stats.data_structure.data_types["start_lat"], "float");
        assert_eq!(stats.data_structure.missing_values["rideable_type"], 1);
    }
}
