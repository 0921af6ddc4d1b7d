//! Destination for analysis outputs: one cumulative text report plus small
//! CSV side files in the same directory.

use std::fs;
use std::path::{Path, PathBuf};

use super::aggregate::{Cell, Grid};
use crate::error::Result;
use crate::output::{append_text, write_rows};

pub const TEXT_REPORT: &str = "analysis_output.txt";

const RULE: &str = "---------------------------";

pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    /// Creates `dir` and starts a fresh, empty text report in it.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(TEXT_REPORT), "")?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Appends a titled section to the text report. Sections after the first
    /// are separated by a blank line.
    pub fn section(&self, title: &str, body: &str) -> Result<()> {
        let path = self.path(TEXT_REPORT);
        let lead = if fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false) {
            "\n"
        } else {
            ""
        };
        append_text(&path, &format!("{lead}{title}\n{RULE}\n{body}\n"))
    }

    pub fn write_grid<T: Cell>(&self, file_name: &str, grid: &Grid<T>) -> Result<()> {
        let (header, rows) = grid.to_records();
        self.write_rows(file_name, &header, &rows)
    }

    pub fn write_rows(&self, file_name: &str, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        write_rows(&self.path(file_name), header, rows)
    }
}
