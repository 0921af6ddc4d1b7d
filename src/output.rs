//! Persistence of tables, one-row records and text reports.
//!
//! Files are written to a temporary sibling first and renamed into place, so a
//! failed run never leaves a truncated output behind.

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::parser::extract_csv;
use crate::stats::flatten;
use crate::table::Table;

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Runs `write` against a temporary file next to `path`, then renames it over
/// `path`. Parent directories are created as needed.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let result = File::create(&tmp).map_err(PipelineError::from).and_then(|file| {
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush()?;
        Ok(())
    });

    match result {
        Ok(()) => {
            fs::rename(&tmp, path)?;
            debug!(path = %path.display(), "File written");
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Writes `table` as CSV, gzip-compressed when `gzip` is set.
pub fn write_table(path: &Path, table: &Table, gzip: bool) -> Result<()> {
    write_atomically(path, |w| {
        if gzip {
            let mut encoder = GzEncoder::new(w, Compression::default());
            table.write_csv(&mut encoder)?;
            encoder.finish()?;
            Ok(())
        } else {
            table.write_csv(w)
        }
    })?;
    info!(path = %path.display(), records = table.len(), gzip, "Table saved");
    Ok(())
}

/// Reads a CSV table written by [`write_table`] (plain or gzip).
///
/// # Errors
///
/// `NotFound` if `path` does not exist, `EmptyInput` if it holds no header.
pub fn read_table(path: &Path) -> Result<Table> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let csv = extract_csv(&bytes)?;
    if csv.iter().all(u8::is_ascii_whitespace) {
        return Err(PipelineError::EmptyInput(path.display().to_string()));
    }
    Table::from_csv_reader(csv.as_slice())
}

/// Writes a serializable value as a one-row CSV, nested keys joined with `.`.
pub fn write_record<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let fields = flatten(value)?;
    write_atomically(path, |w| {
        let mut writer = csv::Writer::from_writer(w);
        writer.write_record(fields.iter().map(|(k, _)| k))?;
        writer.write_record(fields.iter().map(|(_, v)| v))?;
        writer.flush()?;
        Ok(())
    })
}

/// Writes rows of cells under `header` as CSV.
pub fn write_rows(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    write_atomically(path, |w| {
        let mut writer = csv::Writer::from_writer(w);
        writer.write_record(header)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// Appends `text` to `path`, creating the file if needed.
pub fn append_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::DataRetention;

    fn sample() -> Table {
        Table::from_csv_reader("ride_id,trip_duration\nA,5.5\nB,12\n".as_bytes()).unwrap()
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&DataRetention::default()).unwrap();
    }

    #[test]
    fn test_write_then_read_plain_and_gzip() {
        let dir = tempfile::tempdir().unwrap();
        for (name, gzip) in [("t.csv", false), ("t.csv.gz", true)] {
            let path = dir.path().join("nested").join(name);
            write_table(&path, &sample(), gzip).unwrap();
            let back = read_table(&path).unwrap();
            assert_eq!(back.len(), 2);
            assert_eq!(back.column_names(), vec!["ride_id", "trip_duration"]);
        }
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        write_table(&path, &sample(), false).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("t.csv")]);
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        fs::write(&path, "old").unwrap();

        let result = write_atomically(&path, |_| Err(PipelineError::Value("boom".into())));
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
    }

    #[test]
    fn test_read_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_table(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[test]
    fn test_read_empty_file_is_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            read_table(&path).unwrap_err(),
            PipelineError::EmptyInput(_)
        ));
    }

    #[test]
    fn test_write_record_single_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retention.csv");
        write_record(&path, &DataRetention::compute(4, 3, 2)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("after_cleaning.records"));
        assert!(lines[1].contains("75.0"));
    }

    #[test]
    fn test_append_text_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        append_text(&path, "one\n").unwrap();
        append_text(&path, "two\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }
}
