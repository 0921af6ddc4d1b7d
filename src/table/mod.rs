//! Column-oriented trip table.
//!
//! A [`Table`] wraps a polars [`DataFrame`] together with the level order of
//! its categorical columns (weekday and month run in calendar order, which
//! the frame's categorical dtype does not record). Stages never mutate a
//! table in place; projection, row selection and feature derivation all
//! produce a new table.

mod column;
pub mod datetime;

pub use column::{ColumnType, count_values, datetime_values, float_values, text_values};

use chrono::NaiveDateTime;
use polars::io::{SerReader, SerWriter};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
    levels: BTreeMap<String, Vec<String>>,
}

impl Default for Table {
    fn default() -> Self {
        Self::from_frame(DataFrame::empty())
    }
}

impl Table {
    pub fn from_frame(frame: DataFrame) -> Self {
        Self {
            frame,
            levels: BTreeMap::new(),
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Wraps `frame`, keeping the levels of categorical columns it still holds.
    fn derive(&self, frame: DataFrame) -> Table {
        let levels = self
            .levels
            .iter()
            .filter(|(name, _)| frame.column(name.as_str()).is_ok())
            .map(|(name, levels)| (name.clone(), levels.clone()))
            .collect();
        Table { frame, levels }
    }

    /// Reads CSV with a header row. Empty fields are missing values and each
    /// column gets the narrowest type that fits all of its rows.
    pub fn from_csv_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;
        Ok(Self::from_frame(frame))
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut frame = self.frame.clone();
        CsvWriter::new(writer)
            .include_header(true)
            .with_datetime_format(Some(datetime::OUTPUT_LAYOUT.to_string()))
            .finish(&mut frame)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    /// The column `name` as a series.
    pub fn series(&self, name: &str) -> Result<&Series> {
        self.frame
            .column(name)
            .map(|c| c.as_materialized_series())
            .map_err(|_| PipelineError::schema("table", vec![name.to_string()]))
    }

    pub fn dtype(&self, name: &str) -> Option<ColumnType> {
        self.frame.column(name).ok().map(|c| ColumnType::of(c.dtype()))
    }

    pub fn dtypes(&self) -> Vec<(String, ColumnType)> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), ColumnType::of(c.dtype())))
            .collect()
    }

    pub fn null_count(&self, name: &str) -> Option<usize> {
        self.frame.column(name).ok().map(|c| c.null_count())
    }

    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.null_count()))
            .collect()
    }

    /// Category levels of `name`, in order, for categorical columns only.
    pub fn levels(&self, name: &str) -> Option<&[String]> {
        self.levels.get(name).map(Vec::as_slice)
    }

    pub fn text(&self, name: &str) -> Result<Vec<Option<String>>> {
        text_values(self.series(name)?)
    }

    pub fn floats(&self, name: &str) -> Result<Vec<Option<f64>>> {
        float_values(self.series(name)?)
    }

    pub fn counts(&self, name: &str) -> Result<Vec<u64>> {
        count_values(self.series(name)?)
    }

    /// Timestamps of `name`, `None` unless it is a datetime column.
    pub fn datetimes(&self, name: &str) -> Result<Option<Vec<Option<NaiveDateTime>>>> {
        Ok(datetime_values(self.series(name)?))
    }

    /// Names from `required` that this table lacks.
    pub fn missing_columns<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        required
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|name| !self.has_column(name))
            .map(str::to_string)
            .collect()
    }

    /// Fails with a schema error naming `stage` if any column is absent.
    pub fn require<S: AsRef<str>>(&self, stage: &str, required: &[S]) -> Result<()> {
        let missing = self.missing_columns(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::schema(stage, missing))
        }
    }

    /// Keeps only `names`, in that order.
    pub fn project<S: AsRef<str>>(&self, stage: &str, names: &[S]) -> Result<Table> {
        self.require(stage, names)?;
        let frame = self.frame.select(names.iter().map(AsRef::<str>::as_ref))?;
        Ok(self.derive(frame))
    }

    /// Adds a column, replacing any existing column of the same name.
    pub fn with_series(mut self, series: Series) -> Result<Table> {
        let name = series.name().to_string();
        self.frame.with_column(series)?;
        self.levels.remove(&name);
        Ok(self)
    }

    /// Adds an ordered categorical column. Values outside `levels` become missing.
    pub fn with_categorical<S: AsRef<str>>(
        self,
        name: &str,
        values: &[Option<S>],
        levels: &[String],
    ) -> Result<Table> {
        let known: Vec<Option<&str>> = values
            .iter()
            .map(|v| {
                let v: Option<&str> = v.as_ref().map(|s| AsRef::<str>::as_ref(s));
                v.filter(|v| levels.iter().any(|l| l.as_str() == *v))
            })
            .collect();
        let series = Series::new(name.into(), known)
            .cast(&DataType::Categorical(None, CategoricalOrdering::Physical))?;

        let mut table = self.with_series(series)?;
        table.levels.insert(name.to_string(), levels.to_vec());
        Ok(table)
    }

    /// Converts column `name` to `target`, failing if any present value does
    /// not fit. Categorical targets need levels and go through
    /// [`Table::with_categorical`] instead.
    pub fn cast(self, name: &str, target: ColumnType) -> Result<Table> {
        let conversion = |reason: String| PipelineError::Conversion {
            column: name.to_string(),
            expected: target.to_string(),
            reason,
        };

        let series = self.series(name)?;
        let converted = match target {
            ColumnType::Integer => series
                .strict_cast(&DataType::Int64)
                .map_err(|e| conversion(e.to_string()))?,
            ColumnType::Float => series
                .strict_cast(&DataType::Float64)
                .map_err(|e| conversion(e.to_string()))?,
            ColumnType::Text => series.cast(&DataType::String)?,
            ColumnType::DateTime => {
                let (parsed, missing) = datetime::parse_series(series)?;
                let unparsed = missing - series.null_count();
                if unparsed > 0 {
                    return Err(conversion(format!("{unparsed} unparseable values")));
                }
                parsed
            }
            ColumnType::Categorical => {
                return Err(conversion("categorical conversion requires levels".to_string()));
            }
        };
        self.with_series(converted)
    }

    /// New table holding the rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Result<Table> {
        let mask = BooleanChunked::from_slice("mask".into(), mask);
        Ok(self.derive(self.frame.filter(&mask)?))
    }

    /// Drops rows missing a value in any of `required`.
    pub fn drop_nulls(&self, required: &[String]) -> Result<Table> {
        Ok(self.derive(self.frame.drop_nulls(Some(required))?))
    }

    /// Keeps the last row for each value of `key`, in original row order.
    /// Missing keys count as one value.
    pub fn keep_last(&self, key: &str) -> Result<Table> {
        let subset = [key.to_string()];
        let frame =
            self.frame
                .unique_stable(Some(subset.as_slice()), UniqueKeepStrategy::Last, None)?;
        Ok(self.derive(frame))
    }

    /// Number of rows whose `key` repeats an earlier row.
    pub fn duplicate_count(&self, key: &str) -> Result<usize> {
        Ok(self.len() - self.series(key)?.n_unique()?)
    }

    /// Stacks tables vertically. The column set is the union in order of first
    /// appearance and tables lacking a column contribute missing values.
    ///
    /// Columns of differing types are widened to their common supertype
    /// (integer with float gives float, any other mix gives text). Columns
    /// holding no values do not take part in choosing it.
    pub fn concat(tables: Vec<Table>) -> Result<Table> {
        let frames = tables
            .into_iter()
            .map(|t| untyped_nulls(&t.frame).map(DataFrame::lazy))
            .collect::<PolarsResult<Vec<_>>>()?;
        let merged = concat_lf_diagonal(
            frames,
            UnionArgs {
                to_supertypes: true,
                ..Default::default()
            },
        )?
        .collect()?;
        Ok(Table::from_frame(settle_nulls(&merged)?))
    }
}

/// Replaces columns without a single value by `Null`-typed columns, which
/// give way to any other type when frames are stacked.
fn untyped_nulls(frame: &DataFrame) -> PolarsResult<DataFrame> {
    let columns = frame
        .get_columns()
        .iter()
        .map(|c| {
            if c.null_count() == c.len() {
                Series::full_null(c.name().clone(), c.len(), &DataType::Null).into_column()
            } else {
                c.clone()
            }
        })
        .collect();
    DataFrame::new(columns)
}

/// Turns columns still typed `Null` after stacking into text columns.
fn settle_nulls(frame: &DataFrame) -> PolarsResult<DataFrame> {
    let columns = frame
        .get_columns()
        .iter()
        .map(|c| match c.dtype() {
            DataType::Null => c.cast(&DataType::String),
            _ => Ok(c.clone()),
        })
        .collect::<PolarsResult<Vec<_>>>()?;
    DataFrame::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
ride_id,start_lat,member_casual
A1,41.9,member
A2,,casual
A3,41.8,
";

    fn sample() -> Table {
        Table::from_csv_reader(SAMPLE.as_bytes()).unwrap()
    }

    fn csv(text: &str) -> Table {
        Table::from_csv_reader(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_from_csv_infers_types_and_missing() {
        let table = sample();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.dtypes(),
            vec![
                ("ride_id".to_string(), ColumnType::Text),
                ("start_lat".to_string(), ColumnType::Float),
                ("member_casual".to_string(), ColumnType::Text),
            ]
        );
        assert_eq!(
            table.missing_counts(),
            vec![
                ("ride_id".to_string(), 0),
                ("start_lat".to_string(), 1),
                ("member_casual".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_integer_columns_stay_integer() {
        let table = csv("ride_id,hour\n101,7\n102,\n");
        assert_eq!(table.dtype("ride_id"), Some(ColumnType::Integer));
        assert_eq!(table.dtype("hour"), Some(ColumnType::Integer));
    }

    #[test]
    fn test_csv_write_then_read_keeps_cells() {
        let table = sample();
        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("ride_id,start_lat,member_casual\n"));
        assert!(text.contains("A2,,casual"));

        let back = csv(&text);
        assert_eq!(back.dtypes(), table.dtypes());
        assert_eq!(back.text("member_casual").unwrap(), table.text("member_casual").unwrap());
    }

    #[test]
    fn test_datetimes_written_without_fraction() {
        let raw = csv("started_at\n2024-01-15 08:30:00.750\n");
        let table = raw.cast("started_at", ColumnType::DateTime).unwrap();
        assert_eq!(table.dtype("started_at"), Some(ColumnType::DateTime));

        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "started_at\n2024-01-15 08:30:00\n");
    }

    #[test]
    fn test_project_missing_column_is_schema_error() {
        let err = sample().project("clean", &["ride_id", "rideable_type"]).unwrap_err();
        match err {
            PipelineError::Schema { stage, missing } => {
                assert_eq!(stage, "clean");
                assert_eq!(missing, vec!["rideable_type".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_project_reorders() {
        let projected = sample().project("clean", &["member_casual", "ride_id"]).unwrap();
        assert_eq!(projected.column_names(), vec!["member_casual", "ride_id"]);
        assert_eq!(projected.len(), 3);
    }

    #[test]
    fn test_concat_unions_columns() {
        let merged = Table::concat(vec![csv("ride_id,x\nA,1\n"), csv("ride_id,y\nB,z\n")]).unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.column_names(), vec!["ride_id", "x", "y"]);
        assert_eq!(merged.floats("x").unwrap(), vec![Some(1.0), None]);
        assert_eq!(merged.text("y").unwrap(), vec![None, Some("z".to_string())]);
    }

    #[test]
    fn test_concat_promotes_integer_and_float() {
        let merged = Table::concat(vec![csv("lat\n1\n2\n"), csv("lat\n2.5\n")]).unwrap();
        assert_eq!(merged.dtype("lat"), Some(ColumnType::Float));
        assert_eq!(merged.floats("lat").unwrap(), vec![Some(1.0), Some(2.0), Some(2.5)]);
    }

    #[test]
    fn test_concat_ignores_columns_without_values() {
        let merged = Table::concat(vec![csv("id,lat\nA,\nB,\n"), csv("id,lat\nC,41.5\n")]).unwrap();
        assert_eq!(merged.dtype("lat"), Some(ColumnType::Float));
        assert_eq!(merged.floats("lat").unwrap(), vec![None, None, Some(41.5)]);
    }

    #[test]
    fn test_concat_mixed_types_fall_back_to_text() {
        let merged = Table::concat(vec![csv("v\n1\n"), csv("v\nx\n")]).unwrap();
        assert_eq!(merged.dtype("v"), Some(ColumnType::Text));
        assert_eq!(
            merged.text("v").unwrap(),
            vec![Some("1".to_string()), Some("x".to_string())]
        );
    }

    #[test]
    fn test_keep_last_keeps_later_rows_in_order() {
        let table = csv("ride_id,v\nA,1\nB,2\nA,3\n");
        assert_eq!(table.duplicate_count("ride_id").unwrap(), 1);

        let kept = table.keep_last("ride_id").unwrap();
        assert_eq!(kept.floats("v").unwrap(), vec![Some(2.0), Some(3.0)]);
        assert_eq!(kept.duplicate_count("ride_id").unwrap(), 0);
    }

    #[test]
    fn test_drop_nulls_and_filter() {
        let table = sample();
        let complete = table
            .drop_nulls(&["start_lat".to_string(), "member_casual".to_string()])
            .unwrap();
        assert_eq!(complete.text("ride_id").unwrap(), vec![Some("A1".to_string())]);

        let filtered = table.filter(&[false, true, true]).unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_categorical_levels_survive_row_selection() {
        let levels: Vec<String> = ["Monday", "Tuesday"].iter().map(|s| s.to_string()).collect();
        let table = sample()
            .with_categorical("day_of_week", &[Some("Tuesday"), Some("Funday"), None], &levels)
            .unwrap();

        assert_eq!(table.dtype("day_of_week"), Some(ColumnType::Categorical));
        assert_eq!(table.null_count("day_of_week"), Some(2));

        let filtered = table.filter(&[true, false, true]).unwrap();
        assert_eq!(filtered.levels("day_of_week"), Some(levels.as_slice()));
        assert_eq!(
            filtered.text("day_of_week").unwrap(),
            vec![Some("Tuesday".to_string()), None]
        );

        let replaced = filtered.with_series(Series::new("day_of_week".into(), &["x", "y"])).unwrap();
        assert_eq!(replaced.levels("day_of_week"), None);
    }

    #[test]
    fn test_cast_failures() {
        let table = csv("ride_id\nabc\n1\n");
        match table.clone().cast("ride_id", ColumnType::Integer).unwrap_err() {
            PipelineError::Conversion { column, expected, .. } => {
                assert_eq!(column, "ride_id");
                assert_eq!(expected, "integer");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(table.cast("ride_id", ColumnType::DateTime).is_err());
    }

    #[test]
    fn test_with_series_rejects_wrong_length() {
        let series = Series::new("z".into(), &[1i64]);
        assert!(sample().with_series(series).is_err());
    }
}
