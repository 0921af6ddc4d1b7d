//! Results returned by the analysis reports.

use serde::Serialize;

use super::aggregate::Grid;

/// Trip count and share for one rider class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentShare {
    pub rider_class: String,
    pub trips: u64,
    pub percent: f64,
}

#[derive(Debug, Clone)]
pub struct SegmentReport {
    pub shares: Vec<SegmentShare>,
}

/// Summary of casual-minus-member percentage-point differences across the
/// buckets of one usage pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternStats {
    pub max_difference: f64,
    pub max_difference_period: String,
    pub mean_difference: f64,
    pub std_difference: f64,
}

#[derive(Debug, Clone)]
pub struct UsagePattern {
    pub title: &'static str,
    pub counts: Grid<u64>,
    pub percentages: Grid<f64>,
    /// `None` when either rider class is absent.
    pub stats: Option<PatternStats>,
    pub interpretation: String,
}

#[derive(Debug, Clone)]
pub struct UsageReport {
    pub monthly: UsagePattern,
    pub daily: UsagePattern,
    pub hourly: UsagePattern,
}

/// Trip duration summary for one rider class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationSummary {
    pub rider_class: String,
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct RideMetricsReport {
    pub summaries: Vec<DurationSummary>,
    /// Casual mean minus member mean, in minutes.
    pub mean_gap: f64,
    pub distribution: Grid<f64>,
}

#[derive(Debug, Clone)]
pub struct BikePreferenceReport {
    pub counts: Grid<u64>,
    pub percentages: Grid<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStation {
    pub rider_class: String,
    pub station: String,
    pub latitude: f64,
    pub longitude: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationConcentration {
    pub rider_class: String,
    pub total_stations: usize,
    pub gini_coefficient: f64,
    pub top_share: f64,
}

/// Station metrics for either the start or the end of trips.
#[derive(Debug, Clone)]
pub struct StationRoleReport {
    pub role: &'static str,
    pub top_stations: Vec<RankedStation>,
    pub concentration: Vec<StationConcentration>,
}

#[derive(Debug, Clone)]
pub struct StationReport {
    pub start: StationRoleReport,
    pub end: StationRoleReport,
}
