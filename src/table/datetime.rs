//! Lenient timestamp parsing.
//!
//! Trip exports mix layouts between months (ISO with and without fractional
//! seconds, US-style dates, RFC 3339 with offsets), so parsing tries each
//! known layout in turn and yields `None` for anything unrecognised.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound};
use polars::prelude::{NamedFrom, Series};

use super::column::{datetime_values, text_values};
use crate::error::Result;

const LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

/// Layout used whenever a timestamp is written back out.
pub const OUTPUT_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_lenient(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for layout in LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Drops the sub-second component.
pub fn truncate_to_seconds(dt: NaiveDateTime) -> NaiveDateTime {
    dt.trunc_subsecs(0)
}

/// Parses `series` into whole-second timestamps under the same name.
///
/// Datetime series are only truncated; anything else is read as text and
/// parsed with [`parse_lenient`]. Returns the parsed series and the number of
/// missing values after parsing.
pub fn parse_series(series: &Series) -> Result<(Series, usize)> {
    let values: Vec<Option<NaiveDateTime>> = match datetime_values(series) {
        Some(existing) => existing
            .into_iter()
            .map(|v| v.map(truncate_to_seconds))
            .collect(),
        None => text_values(series)?
            .iter()
            .map(|v| v.as_deref().and_then(parse_lenient).map(truncate_to_seconds))
            .collect(),
    };
    let missing = values.iter().filter(|v| v.is_none()).count();
    Ok((Series::new(series.name().clone(), values), missing))
}
