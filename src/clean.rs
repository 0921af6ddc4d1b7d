//! Cleaner: projection, deduplication, missing-data policy, timestamp
//! normalization and type reconciliation.

use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::stats::{CleaningStats, IdChecks, MissingData, TypeIssue, pct, round_to};
use crate::table::{Table, datetime};

const STAGE: &str = "clean";

#[tracing::instrument(skip_all, fields(records = table.len()))]
pub fn clean(table: &Table, config: &PipelineConfig) -> Result<(Table, CleaningStats)> {
    let mut stats = CleaningStats {
        initial_records: table.len(),
        ..Default::default()
    };

    let projected = table.project(STAGE, &config.relevant_columns)?;

    let (deduped, id_checks) = deduplicate(&projected, &config.id_column)?;
    stats.ride_id_checks = id_checks;
    if id_checks.remaining_duplicates > 0 {
        warn!(
            remaining = id_checks.remaining_duplicates,
            "Duplicates remain after deduplication"
        );
    }

    for (column, count) in deduped.missing_counts() {
        if count > 0 {
            stats.missing_data.insert(
                column,
                MissingData {
                    count,
                    percent: round_to(pct(count, deduped.len()), 2),
                },
            );
        }
    }

    let mut cleaned = drop_incomplete(&deduped, &config.required_columns)?;
    stats.records_after_missing = cleaned.len();

    for name in &config.datetime_columns {
        if !cleaned.has_column(name) {
            continue;
        }
        let (parsed, failures) = datetime::parse_series(cleaned.series(name)?)?;
        if failures > 0 {
            warn!(column = %name, failures, "Unparseable timestamps set to missing");
        }
        stats.datetime_parsing_errors.insert(name.clone(), failures);
        cleaned = cleaned.with_series(parsed)?;
    }

    for expected in &config.expected_types {
        let Some(actual) = cleaned.dtype(&expected.column) else {
            continue;
        };
        if actual == expected.dtype {
            continue;
        }

        let converted = match cleaned.clone().cast(&expected.column, expected.dtype) {
            Ok(table) => {
                cleaned = table;
                true
            }
            Err(e) => {
                error!(error = %e, "Type conversion failed, column left as-is");
                false
            }
        };
        stats.data_type_issues.insert(
            expected.column.clone(),
            TypeIssue {
                expected: expected.dtype.to_string(),
                actual: actual.to_string(),
                converted,
            },
        );
    }

    stats.final_clean_records = cleaned.len();
    info!(
        initial = stats.initial_records,
        duplicates_removed = stats.ride_id_checks.duplicates_removed,
        after_missing = stats.records_after_missing,
        type_issues = stats.data_type_issues.len(),
        final_records = stats.final_clean_records,
        "Cleaning complete"
    );
    Ok((cleaned, stats))
}

/// Drops repeated identifiers, keeping the last occurrence of each.
pub fn deduplicate(table: &Table, id_column: &str) -> Result<(Table, IdChecks)> {
    table.require(STAGE, &[id_column])?;
    let deduped = table.keep_last(id_column)?;
    let checks = IdChecks {
        duplicates_removed: table.len() - deduped.len(),
        remaining_duplicates: deduped.duplicate_count(id_column)?,
    };
    Ok((deduped, checks))
}

/// Drops rows missing a value in any of `required`.
pub fn drop_incomplete(table: &Table, required: &[String]) -> Result<Table> {
    table.require(STAGE, required)?;
    table.drop_nulls(required)
}
