//! Logical column types and typed views over polars series.

use chrono::NaiveDateTime;
use polars::prelude::{DataType, Series};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    DateTime,
    Categorical,
}

impl ColumnType {
    /// Logical type of a frame dtype. Anything without a closer match is text.
    pub fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int32 | DataType::Int64 | DataType::UInt32 | DataType::UInt64 => {
                ColumnType::Integer
            }
            DataType::Float32 | DataType::Float64 => ColumnType::Float,
            DataType::Date | DataType::Datetime(_, _) => ColumnType::DateTime,
            DataType::Categorical(_, _) | DataType::Enum(_, _) => ColumnType::Categorical,
            _ => ColumnType::Text,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Text => "text",
            ColumnType::DateTime => "datetime",
            ColumnType::Categorical => "categorical",
        };
        f.write_str(name)
    }
}

/// Cells rendered as text; `None` marks a missing cell.
pub fn text_values(series: &Series) -> Result<Vec<Option<String>>> {
    let text = series.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Numeric cells as `f64`. NaN is treated as missing.
pub fn float_values(series: &Series) -> Result<Vec<Option<f64>>> {
    let floats = series.cast(&DataType::Float64)?;
    Ok(floats
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Group sizes produced by a `len()` aggregation.
pub fn count_values(series: &Series) -> Result<Vec<u64>> {
    let counts = series.cast(&DataType::UInt64)?;
    Ok(counts
        .u64()?
        .into_iter()
        .map(|v| v.unwrap_or(0))
        .collect())
}

/// Timestamps of a datetime series, `None` for any other dtype.
pub fn datetime_values(series: &Series) -> Option<Vec<Option<NaiveDateTime>>> {
    series
        .datetime()
        .ok()
        .map(|ca| ca.as_datetime_iter().collect())
}
