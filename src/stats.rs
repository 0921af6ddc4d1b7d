//! Per-stage process statistics and the merged data-quality report.

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::table::Table;

/// Percentage of `part` in `total`, 0 when `total` is 0.
pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Shape of the unified table right after integration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataStructure {
    pub columns: Vec<String>,
    pub data_types: BTreeMap<String, String>,
    pub unique_identifiers: Vec<String>,
    pub missing_values: BTreeMap<String, usize>,
    pub total_records: usize,
}

impl DataStructure {
    pub fn describe(table: &Table, id_column: &str) -> Self {
        Self {
            columns: table.column_names(),
            data_types: table
                .dtypes()
                .into_iter()
                .map(|(name, dtype)| (name, dtype.to_string()))
                .collect(),
            unique_identifiers: vec![id_column.to_string()],
            missing_values: table.missing_counts().into_iter().collect(),
            total_records: table.len(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrationStats {
    pub files_processed: usize,
    pub total_records: usize,
    pub files_with_errors: Vec<String>,
    pub data_structure: DataStructure,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MissingData {
    pub count: usize,
    pub percent: f64,
}

/// A column whose type differed from the expected schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeIssue {
    pub expected: String,
    pub actual: String,
    pub converted: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IdChecks {
    pub duplicates_removed: usize,
    pub remaining_duplicates: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningStats {
    pub initial_records: usize,
    pub ride_id_checks: IdChecks,
    /// Only columns with at least one missing value are listed.
    pub missing_data: BTreeMap<String, MissingData>,
    pub records_after_missing: usize,
    pub datetime_parsing_errors: BTreeMap<String, usize>,
    pub data_type_issues: BTreeMap<String, TypeIssue>,
    pub final_clean_records: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct InvalidValues {
    pub invalid_values: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ConsistencyIssues {
    pub ended_before_started: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DateRange {
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TransformationStats {
    pub value_range_issues: BTreeMap<String, InvalidValues>,
    pub consistency_issues: ConsistencyIssues,
    pub final_records: usize,
    pub final_variables: usize,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RetentionStep {
    pub records: usize,
    pub retention_percentage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DataRetention {
    pub initial_records: usize,
    pub after_cleaning: RetentionStep,
    pub after_transformation: RetentionStep,
}

impl DataRetention {
    pub fn compute(initial: usize, cleaned: usize, transformed: usize) -> Self {
        let step = |records| RetentionStep {
            records,
            retention_percentage: round_to(pct(records, initial), 2),
        };
        Self {
            initial_records: initial,
            after_cleaning: step(cleaned),
            after_transformation: step(transformed),
        }
    }
}

/// All stage statistics of one run merged into a single record.
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    #[serde(flatten)]
    pub integration: IntegrationStats,
    #[serde(flatten)]
    pub cleaning: CleaningStats,
    #[serde(flatten)]
    pub transformation: TransformationStats,
    pub data_retention: DataRetention,
}

impl QualityReport {
    pub fn new(
        integration: IntegrationStats,
        cleaning: CleaningStats,
        transformation: TransformationStats,
    ) -> Self {
        let data_retention = DataRetention::compute(
            integration.data_structure.total_records,
            cleaning.final_clean_records,
            transformation.final_records,
        );
        Self {
            integration,
            cleaning,
            transformation,
            data_retention,
        }
    }
}

/// Flattens a serializable value into `(dotted.key, cell)` pairs for a
/// one-row CSV. Lists are kept whole as JSON text; nulls become empty cells.
pub fn flatten<T: Serialize>(value: &T) -> serde_json::Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    flatten_into(String::new(), &serde_json::to_value(value)?, &mut out);
    Ok(out)
}

fn flatten_into(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(name, child, out);
            }
        }
        Value::Object(_) => out.push((prefix, "{}".to_string())),
        Value::Null => out.push((prefix, String::new())),
        Value::String(s) => out.push((prefix, s.clone())),
        other => out.push((prefix, other.to_string())),
    }
}
