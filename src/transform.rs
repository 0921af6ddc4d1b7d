//! Transformer: derives trip features and filters physically invalid trips.

use chrono::{Datelike, NaiveDateTime, Timelike};
use polars::prelude::{NamedFrom, Series};
use std::fmt;
use tracing::{info, warn};

use crate::config::{DayPeriodThresholds, PipelineConfig};
use crate::error::Result;
use crate::stats::{ConsistencyIssues, DateRange, InvalidValues, TransformationStats};
use crate::table::{Table, datetime, datetime_values};

pub const STARTED_AT: &str = "started_at";
pub const ENDED_AT: &str = "ended_at";
pub const TRIP_DURATION: &str = "trip_duration";
pub const HOUR: &str = "hour";
pub const DAY_PERIOD: &str = "day_period";
pub const DAY_OF_WEEK: &str = "day_of_week";
pub const MONTH: &str = "month";

const STAGE: &str = "transform";

/// Coarse part of the day a trip starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl DayPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            DayPeriod::Morning => "Morning",
            DayPeriod::Afternoon => "Afternoon",
            DayPeriod::Evening => "Evening",
            DayPeriod::Night => "Night",
        }
    }
}

impl fmt::Display for DayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buckets an hour of day. Hours past `night` and before `morning` are Night.
pub fn categorize_day_period(hour: u32, thresholds: &DayPeriodThresholds) -> DayPeriod {
    match hour {
        h if (thresholds.morning..thresholds.afternoon).contains(&h) => DayPeriod::Morning,
        h if (thresholds.afternoon..thresholds.evening).contains(&h) => DayPeriod::Afternoon,
        h if (thresholds.evening..thresholds.night).contains(&h) => DayPeriod::Evening,
        _ => DayPeriod::Night,
    }
}

/// Trip length in minutes, `None` when either end is missing.
pub fn trip_minutes(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Option<f64> {
    let (start, end) = (start?, end?);
    Some((end - start).num_milliseconds() as f64 / 60_000.0)
}

#[tracing::instrument(skip_all, fields(records = table.len()))]
pub fn transform(table: &Table, config: &PipelineConfig) -> Result<(Table, TransformationStats)> {
    let rider_column = config.analysis.rider_column.as_str();
    table.require(STAGE, &[STARTED_AT, ENDED_AT, rider_column])?;

    let started = timestamps(table, STARTED_AT)?;
    let ended = timestamps(table, ENDED_AT)?;

    let durations: Vec<Option<f64>> = started
        .iter()
        .zip(ended.iter())
        .map(|(s, e)| trip_minutes(*s, *e))
        .collect();
    let mask: Vec<bool> = durations
        .iter()
        .map(|d| d.is_some_and(|d| d > 0.0 && d <= config.max_trip_minutes))
        .collect();
    let excluded = mask.iter().filter(|keep| !**keep).count();
    if excluded > 0 {
        info!(excluded, "Trips outside the valid duration range excluded");
    }

    let kept = |values: &[Option<NaiveDateTime>]| -> Vec<Option<NaiveDateTime>> {
        values
            .iter()
            .zip(&mask)
            .filter(|(_, keep)| **keep)
            .map(|(v, _)| *v)
            .collect()
    };
    let starts = kept(&started);
    let ends = kept(&ended);
    let durations: Vec<Option<f64>> = durations
        .iter()
        .zip(&mask)
        .filter(|(_, keep)| **keep)
        .map(|(d, _)| *d)
        .collect();

    let hours: Vec<Option<i64>> = starts.iter().map(|s| s.map(|s| i64::from(s.hour()))).collect();
    let periods: Vec<Option<&str>> = starts
        .iter()
        .map(|s| s.map(|s| categorize_day_period(s.hour(), &config.day_periods).as_str()))
        .collect();
    let weekdays = calendar_names(&starts, &config.day_names, |s| {
        s.weekday().num_days_from_monday() as usize
    });
    let months = calendar_names(&starts, &config.month_names, |s| s.month0() as usize);

    let transformed = table
        .filter(&mask)?
        .with_series(Series::new(TRIP_DURATION.into(), durations))?
        .with_series(Series::new(HOUR.into(), hours))?
        .with_series(Series::new(DAY_PERIOD.into(), periods))?
        .with_categorical(DAY_OF_WEEK, &weekdays, &config.day_names)?
        .with_categorical(MONTH, &months, &config.month_names)?;

    let riders = transformed.text(rider_column)?;
    let invalid_riders = riders
        .iter()
        .filter(|r| {
            r.as_ref()
                .is_none_or(|r| !config.valid_rider_classes.contains(r))
        })
        .count();
    if invalid_riders > 0 {
        warn!(invalid_riders, "Rider class values outside the valid set");
    }

    let ended_before_started = starts
        .iter()
        .zip(ends.iter())
        .filter(|(s, e)| matches!((s, e), (Some(s), Some(e)) if e < s))
        .count();

    let mut stats = TransformationStats {
        consistency_issues: ConsistencyIssues {
            ended_before_started,
        },
        final_records: transformed.len(),
        final_variables: transformed.width(),
        date_range: DateRange {
            start_date: starts.iter().flatten().min().copied(),
            end_date: starts.iter().flatten().max().copied(),
        },
        ..Default::default()
    };
    stats.value_range_issues.insert(
        rider_column.to_string(),
        InvalidValues {
            invalid_values: invalid_riders,
        },
    );

    info!(
        final_records = stats.final_records,
        final_variables = stats.final_variables,
        "Transformation complete"
    );
    Ok((transformed, stats))
}

/// Timestamps of `name`, parsing text columns on the fly.
fn timestamps(table: &Table, name: &str) -> Result<Vec<Option<NaiveDateTime>>> {
    if let Some(values) = table.datetimes(name)? {
        return Ok(values);
    }
    let (parsed, _) = datetime::parse_series(table.series(name)?)?;
    Ok(datetime_values(&parsed).unwrap_or_else(|| vec![None; table.len()]))
}

/// Calendar names for each start time, `index` picking the position in `names`.
fn calendar_names<'a>(
    starts: &[Option<NaiveDateTime>],
    names: &'a [String],
    index: impl Fn(NaiveDateTime) -> usize,
) -> Vec<Option<&'a str>> {
    starts
        .iter()
        .map(|s| s.and_then(|s| names.get(index(s))).map(String::as_str))
        .collect()
}
