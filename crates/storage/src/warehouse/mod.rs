//! Relational store for raw rows and the derived yearly summary.

mod memory;
mod postgres;

pub use memory::MemoryWarehouse;
pub use postgres::PgWarehouse;

use async_trait::async_trait;

use climate_common::{AnnualSummary, FireRow, PipelineResult, TemperatureRow};

pub const RAW_TEMPERATURES_TABLE: &str = "raw_temperatures";
pub const RAW_FIRES_TABLE: &str = "raw_fires";
pub const SUMMARY_TABLE: &str = "annual_global_summary";

/// How a fire batch lands in `raw_fires`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop the table and recreate it from this batch.
    Replace,
    /// Create the table if missing, then add this batch.
    Append,
}

impl WriteMode {
    /// First batch of a load replaces, every later batch appends.
    pub fn for_batch(is_first_batch: bool) -> Self {
        if is_first_batch {
            WriteMode::Replace
        } else {
            WriteMode::Append
        }
    }
}

/// Writer and reader for the warehouse tables.
///
/// Every write runs in a single transaction: a failed write leaves the table
/// as it was.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Replace `raw_temperatures` with these rows. Duplicate years keep the
    /// last row.
    async fn replace_temperatures(&self, rows: &[TemperatureRow]) -> PipelineResult<u64>;

    /// Write one file's fire rows to `raw_fires`.
    async fn write_fire_batch(&self, rows: &[FireRow], mode: WriteMode) -> PipelineResult<u64>;

    /// Rebuild `annual_global_summary` from the raw tables. Returns the row count.
    async fn rebuild_summary(&self) -> PipelineResult<u64>;

    /// Summary rows, year descending.
    async fn read_summary(&self) -> PipelineResult<Vec<AnnualSummary>>;

    /// Temperature rows, year ascending.
    async fn read_temperatures(&self) -> PipelineResult<Vec<TemperatureRow>>;

    /// Fire rows ordered by date, then source file.
    async fn read_fires(&self) -> PipelineResult<Vec<FireRow>>;
}

/// Collapse duplicate years, last value wins, ascending.
pub(crate) fn dedupe_temperatures(rows: &[TemperatureRow]) -> Vec<TemperatureRow> {
    let by_year: std::collections::BTreeMap<i32, f64> = rows
        .iter()
        .map(|r| (r.year, r.temp_anomaly_celsius))
        .collect();
    by_year
        .into_iter()
        .map(|(year, temp_anomaly_celsius)| TemperatureRow {
            year,
            temp_anomaly_celsius,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_mode_for_batch() {
        assert_eq!(WriteMode::for_batch(true), WriteMode::Replace);
        assert_eq!(WriteMode::for_batch(false), WriteMode::Append);
    }

    #[test]
    fn test_dedupe_keeps_last() {
        let rows = [
            TemperatureRow { year: 2001, temp_anomaly_celsius: 0.1 },
            TemperatureRow { year: 2000, temp_anomaly_celsius: 0.4 },
            TemperatureRow { year: 2001, temp_anomaly_celsius: 0.5 },
        ];
        let deduped = dedupe_temperatures(&rows);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].year, 2000);
        assert_eq!(deduped[1].temp_anomaly_celsius, 0.5);
    }
}
