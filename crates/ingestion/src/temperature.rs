//! GISTEMP global mean temperature anomalies.
//!
//! The upstream table starts with a one-line title, then a header with
//! `Year`, the monthly columns and the `J-D` annual mean. Missing values are
//! written as `***`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim, WriterBuilder};
use tracing::{debug, info};

use climate_common::TemperatureRow;

use crate::error::{IngestionError, Result};
use crate::files::write_atomic;

pub const YEAR_COLUMN: &str = "Year";
pub const ANNUAL_MEAN_COLUMN: &str = "J-D";

/// Lines before the header row.
pub const METADATA_LINES: usize = 1;

/// Name of the cleaned table written next to the raw download.
pub const CLEAN_FILE_NAME: &str = "global_temps_clean.csv";

fn skip_lines(data: &[u8], lines: usize) -> &[u8] {
    let mut rest = data;
    for _ in 0..lines {
        match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return &[],
        }
    }
    rest
}

fn parse_anomaly(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a GISTEMP table into one row per year, ascending.
///
/// Rows without a numeric annual mean are dropped. A repeated year keeps the
/// last value.
pub fn parse_gistemp(data: &[u8]) -> Result<Vec<TemperatureRow>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(skip_lines(data, METADATA_LINES));

    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| IngestionError::MissingColumn(name.to_string()))
    };
    let year_idx = position(YEAR_COLUMN)?;
    let value_idx = position(ANNUAL_MEAN_COLUMN)?;

    let mut by_year = BTreeMap::new();
    let mut dropped = 0usize;
    for record in reader.records() {
        let record = record?;
        let year = record.get(year_idx).and_then(|y| y.parse::<i32>().ok());
        let value = record.get(value_idx).and_then(parse_anomaly);
        match (year, value) {
            (Some(year), Some(value)) => {
                by_year.insert(year, value);
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, "Dropped temperature rows without a numeric annual mean");
    }

    Ok(by_year
        .into_iter()
        .map(|(year, temp_anomaly_celsius)| TemperatureRow {
            year,
            temp_anomaly_celsius,
        })
        .collect())
}

/// Render rows as `year,temp_anomaly_celsius`.
pub fn to_clean_csv(rows: &[TemperatureRow]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| IngestionError::FileRead(e.into_error()))
}

/// Parse the raw download at `raw_path` and write the cleaned table next to it.
pub async fn write_clean_file(raw_path: &Path) -> Result<(PathBuf, usize)> {
    let raw = tokio::fs::read(raw_path).await?;
    let rows = parse_gistemp(&raw)?;
    let clean_path = raw_path.with_file_name(CLEAN_FILE_NAME);
    write_atomic(&clean_path, &to_clean_csv(&rows)?).await?;

    info!(path = %clean_path.display(), rows = rows.len(), "Wrote cleaned temperature table");
    Ok((clean_path, rows.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Land-Ocean: Global Means
Year,Jan,J-D,D-N
1880,-.18,-.17,***
2000,.26,.39,.40
2023,1.18,***,1.17
";

    #[test]
    fn test_skips_title_and_missing_values() {
        let rows = parse_gistemp(SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![
                TemperatureRow { year: 1880, temp_anomaly_celsius: -0.17 },
                TemperatureRow { year: 2000, temp_anomaly_celsius: 0.39 },
            ]
        );
    }

    #[test]
    fn test_duplicate_year_keeps_last() {
        let data = "title\nYear,J-D\n2001,.50\n2001,.54\n";
        let rows = parse_gistemp(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].temp_anomaly_celsius, 0.54);
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let data = "title\nYear,J-D\n2001,NaN\n2002,inf\n2003,.6\n";
        let rows = parse_gistemp(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].year, 2003);
    }

    #[test]
    fn test_missing_annual_column_is_an_error() {
        let data = "title\nYear,Jan\n2001,.5\n";
        let err = parse_gistemp(data.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestionError::MissingColumn(c) if c == "J-D"));
    }

    #[test]
    fn test_clean_csv_header() {
        let rows = parse_gistemp(SAMPLE.as_bytes()).unwrap();
        let csv = String::from_utf8(to_clean_csv(&rows).unwrap()).unwrap();
        assert_eq!(csv, "year,temp_anomaly_celsius\n1880,-0.17\n2000,0.39\n");
    }
}
