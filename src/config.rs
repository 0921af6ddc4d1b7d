//! Pipeline configuration.
//!
//! Every threshold and column list the stages use lives here so tests can
//! substitute alternate values. Stored on disk as a JSON object; keys that are
//! absent fall back to [`PipelineConfig::default`]:
//! ```json
//! {
//!   "sources": ["https://divvy-tripdata.s3.amazonaws.com/202401-divvy-tripdata.zip"],
//!   "top_n": 5
//! }
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::table::ColumnType;

const DIVVY_MONTHS: &[&str] = &[
    "202311", "202312", "202401", "202402", "202403", "202404", "202405", "202406", "202407",
    "202408", "202409", "202410",
];

/// A column whose type the cleaner reconciles.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpectedType {
    pub column: String,
    pub dtype: ColumnType,
}

/// Hour thresholds splitting a day into Morning/Afternoon/Evening/Night.
///
/// `[morning, afternoon)` is Morning, `[afternoon, evening)` Afternoon,
/// `[evening, night)` Evening and anything else Night.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DayPeriodThresholds {
    pub morning: u32,
    pub afternoon: u32,
    pub evening: u32,
    pub night: u32,
}

impl Default for DayPeriodThresholds {
    fn default() -> Self {
        Self {
            morning: 5,
            afternoon: 12,
            evening: 17,
            night: 21,
        }
    }
}

/// Settings read by the five analysis reports.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub rider_column: String,
    pub casual_label: String,
    pub member_label: String,
    /// Lower edges of the trip-duration buckets; the last bucket is open-ended.
    pub duration_edges: Vec<f64>,
    pub duration_labels: Vec<String>,
    pub top_n: usize,
    pub large_difference: f64,
    pub moderate_difference: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rider_column: "member_casual".to_string(),
            casual_label: "casual".to_string(),
            member_label: "member".to_string(),
            duration_edges: vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0],
            duration_labels: strings(&["0-10", "10-20", "20-30", "30-40", "40-50", "50-60", "60+"]),
            top_n: 10,
            large_difference: 5.0,
            moderate_difference: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sources: Vec<String>,
    pub processed_dir: PathBuf,
    pub analysis_dir: PathBuf,
    pub id_column: String,
    pub relevant_columns: Vec<String>,
    pub required_columns: Vec<String>,
    pub datetime_columns: Vec<String>,
    pub expected_types: Vec<ExpectedType>,
    pub valid_rider_classes: Vec<String>,
    pub day_names: Vec<String>,
    pub month_names: Vec<String>,
    pub day_periods: DayPeriodThresholds,
    pub max_trip_minutes: f64,
    pub analysis: AnalysisConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: DIVVY_MONTHS
                .iter()
                .map(|m| format!("https://divvy-tripdata.s3.amazonaws.com/{m}-divvy-tripdata.zip"))
                .collect(),
            processed_dir: PathBuf::from("data/processed"),
            analysis_dir: PathBuf::from("results/analysis_outputs"),
            id_column: "ride_id".to_string(),
            relevant_columns: strings(&[
                "ride_id",
                "rideable_type",
                "started_at",
                "ended_at",
                "start_station_name",
                "end_station_name",
                "start_lat",
                "start_lng",
                "end_lat",
                "end_lng",
                "member_casual",
            ]),
            required_columns: strings(&[
                "started_at",
                "ended_at",
                "start_station_name",
                "member_casual",
            ]),
            datetime_columns: strings(&["started_at", "ended_at"]),
            expected_types: vec![
                expected("ride_id", ColumnType::Text),
                expected("started_at", ColumnType::DateTime),
                expected("ended_at", ColumnType::DateTime),
                expected("start_station_name", ColumnType::Text),
                expected("member_casual", ColumnType::Text),
            ],
            valid_rider_classes: strings(&["member", "casual"]),
            day_names: strings(&[
                "Monday",
                "Tuesday",
                "Wednesday",
                "Thursday",
                "Friday",
                "Saturday",
                "Sunday",
            ]),
            month_names: strings(&[
                "January",
                "February",
                "March",
                "April",
                "May",
                "June",
                "July",
                "August",
                "September",
                "October",
                "November",
                "December",
            ]),
            day_periods: DayPeriodThresholds::default(),
            max_trip_minutes: 1440.0,
            analysis: AnalysisConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the stages rely on.
    pub fn validate(&self) -> Result<()> {
        if self.day_names.len() != 7 {
            return Err(PipelineError::Configuration(format!(
                "expected 7 day names, got {}",
                self.day_names.len()
            )));
        }
        if self.month_names.len() != 12 {
            return Err(PipelineError::Configuration(format!(
                "expected 12 month names, got {}",
                self.month_names.len()
            )));
        }
        let edges = &self.analysis.duration_edges;
        if edges.is_empty() || edges.len() != self.analysis.duration_labels.len() {
            return Err(PipelineError::Configuration(
                "duration_edges and duration_labels must be non-empty and the same length"
                    .to_string(),
            ));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PipelineError::Configuration(
                "duration_edges must be strictly increasing".to_string(),
            ));
        }
        let p = self.day_periods;
        if !(p.morning < p.afternoon && p.afternoon < p.evening && p.evening < p.night) {
            return Err(PipelineError::Configuration(
                "day period thresholds must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cleaned_data_path(&self, gzip: bool) -> PathBuf {
        let name = if gzip {
            "cleaned_bike_data.csv.gz"
        } else {
            "cleaned_bike_data.csv"
        };
        self.processed_dir.join(name)
    }

    pub fn quality_report_path(&self) -> PathBuf {
        self.processed_dir.join("data_quality_report.csv")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.processed_dir.join("initial_data_structure.csv")
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn expected(column: &str, dtype: ColumnType) -> ExpectedType {
    ExpectedType {
        column: column.to_string(),
        dtype,
    }
}
