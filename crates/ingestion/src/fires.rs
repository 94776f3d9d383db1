//! FIRMS fire detections.
//!
//! Columns are matched by header name, so files from different products and
//! archive years load into the same shape. Any optional column a file lacks
//! is `None` for all of its rows.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use climate_common::FireRow;

use crate::error::Result;

pub const LATITUDE_COLUMN: &str = "latitude";
pub const LONGITUDE_COLUMN: &str = "longitude";
pub const DATE_COLUMN: &str = "acq_date";
pub const INTENSITY_COLUMN: &str = "frp";
pub const CONFIDENCE_COLUMN: &str = "confidence";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Rows parsed from one file, plus what was left out.
#[derive(Debug, Clone, Default)]
pub struct FireBatch {
    pub rows: Vec<FireRow>,
    /// Rows dropped because the date did not parse.
    pub dropped: usize,
    /// Recognized columns the file did not have.
    pub missing_columns: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    latitude: Option<usize>,
    longitude: Option<usize>,
    date: Option<usize>,
    intensity: Option<usize>,
    confidence: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Self {
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        Self {
            latitude: find(LATITUDE_COLUMN),
            longitude: find(LONGITUDE_COLUMN),
            date: find(DATE_COLUMN),
            intensity: find(INTENSITY_COLUMN),
            confidence: find(CONFIDENCE_COLUMN),
        }
    }

    fn missing(&self) -> Vec<&'static str> {
        [
            (LATITUDE_COLUMN, self.latitude),
            (LONGITUDE_COLUMN, self.longitude),
            (DATE_COLUMN, self.date),
            (INTENSITY_COLUMN, self.intensity),
            (CONFIDENCE_COLUMN, self.confidence),
        ]
        .into_iter()
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

fn field<'a>(record: &'a StringRecord, idx: Option<usize>) -> Option<&'a str> {
    idx.and_then(|i| record.get(i)).filter(|v| !v.is_empty())
}

fn number(record: &StringRecord, idx: Option<usize>) -> Option<f64> {
    field(record, idx)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Parse one FIRMS CSV. `source_file` is stamped on every row.
///
/// A file without an `acq_date` column yields no rows; that is logged, not
/// treated as an error.
pub fn parse_firms(data: &[u8], source_file: &str) -> Result<FireBatch> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let columns = Columns::locate(&headers);
    let missing_columns = columns.missing();

    let Some(date_idx) = columns.date else {
        warn!(source_file, "No acq_date column, skipping file");
        return Ok(FireBatch {
            rows: Vec::new(),
            dropped: 0,
            missing_columns,
        });
    };

    if !missing_columns.is_empty() {
        debug!(source_file, missing = ?missing_columns, "Columns absent, stored as NULL");
    }

    let mut rows = Vec::new();
    let mut dropped = 0;
    for record in reader.records() {
        let record = record?;
        let date = record
            .get(date_idx)
            .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok());
        let Some(fire_date) = date else {
            dropped += 1;
            continue;
        };

        rows.push(FireRow {
            latitude: number(&record, columns.latitude),
            longitude: number(&record, columns.longitude),
            fire_date,
            intensity_mw: number(&record, columns.intensity),
            confidence: field(&record, columns.confidence).map(str::to_string),
            source_file: source_file.to_string(),
        });
    }

    if dropped > 0 {
        warn!(source_file, dropped, "Dropped rows with unparseable acq_date");
    }

    Ok(FireBatch {
        rows,
        dropped,
        missing_columns,
    })
}
