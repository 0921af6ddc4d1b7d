//! Decoding of downloaded trip files into tables.
//!
//! Monthly exports arrive as zip archives holding one CSV file. Gzip-compressed
//! and plain CSV payloads are accepted too, which is how locally cached copies
//! are usually stored.

use flate2::read::GzDecoder;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::error::{PipelineError, Result};
use crate::table::Table;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

/// How a payload is packed, detected from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packing {
    Zip,
    Gzip,
    Plain,
}

impl Packing {
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(ZIP_MAGIC) {
            Packing::Zip
        } else if bytes.starts_with(GZIP_MAGIC) {
            Packing::Gzip
        } else {
            Packing::Plain
        }
    }
}

/// Returns the raw CSV text held by `bytes`.
///
/// For zip archives the first entry ending in `.csv` is used; macOS resource
/// fork entries under `__MACOSX/` are skipped.
pub fn extract_csv(bytes: &[u8]) -> Result<Vec<u8>> {
    match Packing::detect(bytes) {
        Packing::Zip => {
            let mut archive = ZipArchive::new(Cursor::new(bytes))?;
            for i in 0..archive.len() {
                let mut entry = archive.by_index(i)?;
                let name = entry.name().to_string();
                if !name.ends_with(".csv") || name.starts_with("__MACOSX/") {
                    continue;
                }
                let mut csv = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut csv)?;
                return Ok(csv);
            }
            Err(PipelineError::Value(
                "archive contains no .csv entry".to_string(),
            ))
        }
        Packing::Gzip => {
            let mut csv = Vec::new();
            GzDecoder::new(bytes).read_to_end(&mut csv)?;
            Ok(csv)
        }
        Packing::Plain => Ok(bytes.to_vec()),
    }
}

/// Decodes a zip, gzip or plain CSV payload into a [`Table`].
pub fn parse_table(bytes: &[u8]) -> Result<Table> {
    let csv = extract_csv(bytes)?;
    Table::from_csv_reader(csv.as_slice())
}
