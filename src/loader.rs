//! CSV loader for the survey and environment tables.
//!
//! Source tables have no header row by default. Cells are kept as trimmed
//! text; timestamps are parsed later by the aligner and measurements are
//! coerced to numbers just before evaluation.

use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::records::{Measurement, RawRecord, SurveyResponse};

/// Column positions of the survey table:
/// `time, sex, age, office, clothing, activity, TSV, change`.
pub mod survey_columns {
    pub const TIME: usize = 0;
    pub const OFFICE: usize = 3;
    pub const CLOTHING: usize = 4;
    pub const ACTIVITY: usize = 5;
}

/// Column positions of the environment table:
/// `time, office, tdb, tr, vr, rh`.
pub mod environment_columns {
    pub const TIME: usize = 0;
    pub const OFFICE: usize = 1;
    pub const TDB: usize = 2;
    pub const TR: usize = 3;
    pub const VR: usize = 4;
    pub const RH: usize = 5;
}

/// Rows read from one table.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub records: Vec<RawRecord<T>>,
    /// Rows too short to carry every needed column.
    pub short_rows: usize,
}

impl<T> Loaded<T> {
    pub fn rows_read(&self) -> usize {
        self.records.len() + self.short_rows
    }
}

/// Reads survey rows from any CSV source.
pub fn read_survey<R: Read>(reader: R, has_headers: bool) -> Result<Loaded<SurveyResponse>> {
    use survey_columns::*;

    read_rows(reader, has_headers, ACTIVITY, |row| RawRecord {
        time: cell(row, TIME),
        partition_key: cell(row, OFFICE),
        payload: SurveyResponse {
            clothing: cell(row, CLOTHING),
            activity: cell(row, ACTIVITY),
        },
    })
}

/// Reads environment rows from any CSV source.
pub fn read_environment<R: Read>(reader: R, has_headers: bool) -> Result<Loaded<Measurement>> {
    use environment_columns::*;

    read_rows(reader, has_headers, RH, |row| RawRecord {
        time: cell(row, TIME),
        partition_key: cell(row, OFFICE),
        payload: Measurement {
            tdb: cell(row, TDB),
            tr: cell(row, TR),
            vr: cell(row, VR),
            rh: cell(row, RH),
        },
    })
}

/// Opens and reads the survey table at `path`.
pub fn load_survey(path: &Path, has_headers: bool) -> Result<Loaded<SurveyResponse>> {
    let file = File::open(path).with_context(|| format!("opening survey table {}", path.display()))?;
    let loaded = read_survey(file, has_headers)?;
    info!(path = %path.display(), rows = loaded.records.len(), short_rows = loaded.short_rows, "Survey table loaded");
    Ok(loaded)
}

/// Opens and reads the environment table at `path`.
pub fn load_environment(path: &Path, has_headers: bool) -> Result<Loaded<Measurement>> {
    let file = File::open(path)
        .with_context(|| format!("opening environment table {}", path.display()))?;
    let loaded = read_environment(file, has_headers)?;
    info!(path = %path.display(), rows = loaded.records.len(), short_rows = loaded.short_rows, "Environment table loaded");
    Ok(loaded)
}

fn read_rows<R, T, F>(reader: R, has_headers: bool, last_column: usize, build: F) -> Result<Loaded<T>>
where
    R: Read,
    F: Fn(&ByteRecord) -> RawRecord<T>,
{
    let mut rdr = ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    let mut short_rows = 0;
    let mut row = ByteRecord::new();

    while rdr.read_byte_record(&mut row)? {
        if row.len() <= last_column {
            short_rows += 1;
            debug!(line = ?row.position().map(|p| p.line()), columns = row.len(), "Dropping short row");
            continue;
        }
        records.push(build(&row));
    }

    Ok(Loaded {
        records,
        short_rows,
    })
}

fn cell(row: &ByteRecord, index: usize) -> String {
    let raw = row.get(index).unwrap_or_default();
    String::from_utf8_lossy(raw)
        .trim_start_matches('\u{feff}')
        .trim()
        .to_string()
}
