//! Group-wise counting, cross-tabulation and percentage normalization.

use polars::prelude::{IntoLazy, col, len, lit};
use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::stats::round_to;
use crate::table::Table;

/// A value that can be shown in a report cell.
pub trait Cell: Copy {
    fn render(&self) -> String;
}

impl Cell for u64 {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl Cell for f64 {
    fn render(&self) -> String {
        if self.is_nan() {
            "NaN".to_string()
        } else {
            format!("{self:.2}")
        }
    }
}

/// Two-way table with labelled rows and columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    /// Name of the dimension along the rows (e.g. `member_casual`).
    pub row_name: String,
    /// Name of the dimension along the columns (e.g. `month`).
    pub column_name: String,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<T>>,
}

impl<T: Cell> Grid<T> {
    pub fn row(&self, label: &str) -> Option<&[T]> {
        let i = self.rows.iter().position(|r| r == label)?;
        Some(&self.values[i])
    }

    pub fn get(&self, row: &str, column: &str) -> Option<T> {
        let j = self.columns.iter().position(|c| c == column)?;
        self.row(row).map(|values| values[j])
    }

    pub fn transpose(&self) -> Grid<T> {
        let values = (0..self.columns.len())
            .map(|j| self.values.iter().map(|row| row[j]).collect())
            .collect();
        Grid {
            row_name: self.column_name.clone(),
            column_name: self.row_name.clone(),
            rows: self.columns.clone(),
            columns: self.rows.clone(),
            values,
        }
    }

    /// Header and rows for CSV output; the first column holds the row labels.
    pub fn to_records(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let header = std::iter::once(self.row_name.clone())
            .chain(self.columns.iter().cloned())
            .collect();
        let rows = self
            .rows
            .iter()
            .zip(&self.values)
            .map(|(label, values)| {
                std::iter::once(label.clone())
                    .chain(values.iter().map(Cell::render))
                    .collect()
            })
            .collect();
        (header, rows)
    }

    /// Fixed-width text rendering for the human-readable report.
    pub fn render(&self) -> String {
        let (header, rows) = self.to_records();
        render_rows(&header, &rows)
    }
}

/// Renders `rows` under `header` as right-aligned fixed-width text; the first
/// column is left-aligned.
pub fn render_rows(header: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &w))| {
                if i == 0 {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut out = line(header);
    for row in rows {
        out.push('\n');
        out.push_str(&line(row.as_slice()));
    }
    out
}

/// Name of the count column produced by [`group_counts`].
pub const COUNT: &str = "count";

/// Trip counts per distinct combination of `keys`, in order of first
/// appearance. Rows missing any key are skipped.
pub fn group_counts(table: &Table, keys: &[&str]) -> Result<Table> {
    table.require("aggregate", keys)?;
    let present = keys
        .iter()
        .map(|k| col(*k).is_not_null())
        .reduce(|a, b| a.and(b))
        .unwrap_or_else(|| lit(true));
    let frame = table
        .frame()
        .clone()
        .lazy()
        .filter(present)
        .group_by_stable(keys.iter().map(|k| col(*k)).collect::<Vec<_>>())
        .agg([len().alias(COUNT)])
        .collect()?;
    Ok(Table::from_frame(frame))
}

/// Labels used along one grouping axis: every level for categorical columns
/// (calendar order), otherwise the observed values in sorted order.
fn axis_labels<'a>(
    table: &Table,
    column: &str,
    observed: impl Iterator<Item = &'a String>,
) -> Vec<String> {
    match table.levels(column) {
        Some(levels) => levels.to_vec(),
        None => observed.cloned().collect::<BTreeSet<_>>().into_iter().collect(),
    }
}

/// Trip counts per value of `column`, sorted by label. Missing values are skipped.
pub fn value_counts(table: &Table, column: &str) -> Result<Vec<(String, u64)>> {
    let counted = group_counts(table, &[column])?;
    let counts: HashMap<String, u64> = counted
        .text(column)?
        .into_iter()
        .zip(counted.counts(COUNT)?)
        .filter_map(|(label, n)| label.map(|label| (label, n)))
        .collect();
    let labels = axis_labels(table, column, counts.keys());
    Ok(labels
        .into_iter()
        .map(|label| {
            let n = counts.get(&label).copied().unwrap_or(0);
            (label, n)
        })
        .collect())
}

/// Counts of `row_column` x `col_column`, zero-filled. Rows missing either
/// value are skipped.
pub fn crosstab(table: &Table, row_column: &str, col_column: &str) -> Result<Grid<u64>> {
    let counted = group_counts(table, &[row_column, col_column])?;
    let cells: Vec<(String, String, u64)> = counted
        .text(row_column)?
        .into_iter()
        .zip(counted.text(col_column)?)
        .zip(counted.counts(COUNT)?)
        .filter_map(|((r, c), n)| Some((r?, c?, n)))
        .collect();

    let rows = axis_labels(table, row_column, cells.iter().map(|(r, _, _)| r));
    let columns = axis_labels(table, col_column, cells.iter().map(|(_, c, _)| c));
    let row_index: HashMap<&str, usize> =
        rows.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();
    let col_index: HashMap<&str, usize> =
        columns.iter().enumerate().map(|(j, l)| (l.as_str(), j)).collect();

    let mut values = vec![vec![0u64; columns.len()]; rows.len()];
    for (r, c, n) in &cells {
        if let (Some(&i), Some(&j)) = (row_index.get(r.as_str()), col_index.get(c.as_str())) {
            values[i][j] += n;
        }
    }

    Ok(Grid {
        row_name: row_column.to_string(),
        column_name: col_column.to_string(),
        rows,
        columns,
        values,
    })
}

/// Normalizes each row to percentages of its total, rounded to 2 decimals.
/// Rows with no trips are all zero.
pub fn percent_by_row(grid: &Grid<u64>) -> Grid<f64> {
    let values = grid
        .values
        .iter()
        .map(|row| {
            let total: u64 = row.iter().sum();
            row.iter()
                .map(|&v| {
                    if total == 0 {
                        0.0
                    } else {
                        round_to(v as f64 / total as f64 * 100.0, 2)
                    }
                })
                .collect()
        })
        .collect();
    Grid {
        row_name: grid.row_name.clone(),
        column_name: grid.column_name.clone(),
        rows: grid.rows.clone(),
        columns: grid.columns.clone(),
        values,
    }
}

/// Percentage split of labelled counts, rounded to 2 decimals.
pub fn percent_split(counts: &[(String, u64)]) -> Vec<(String, f64)> {
    let total: u64 = counts.iter().map(|(_, n)| n).sum();
    counts
        .iter()
        .map(|(label, n)| {
            let share = if total == 0 {
                0.0
            } else {
                round_to(*n as f64 / total as f64 * 100.0, 2)
            };
            (label.clone(), share)
        })
        .collect()
}
