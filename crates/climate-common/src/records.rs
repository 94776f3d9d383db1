//! Row types that flow between the fetch, load and transform stages.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::partition::Partition;

/// Proof that a partition was retrieved and written to local storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRecord {
    pub partition: Partition,
    /// Path of the partition file, relative to the storage root.
    pub location: String,
    pub size_bytes: u64,
    pub fetched_at: DateTime<Utc>,
}

impl FetchRecord {
    pub fn new(partition: Partition, location: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            partition,
            location: location.into(),
            size_bytes,
            fetched_at: Utc::now(),
        }
    }
}

/// One annual global temperature anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRow {
    pub year: i32,
    pub temp_anomaly_celsius: f64,
}

/// One fire detection, projected from an upstream FIRMS row.
///
/// Optional fields are `None` when the source file did not carry the column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireRow {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub fire_date: NaiveDate,
    pub intensity_mw: Option<f64>,
    pub confidence: Option<String>,
    /// Ledger location of the file the row came from.
    pub source_file: String,
}

/// One row of the derived yearly summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualSummary {
    pub year: i32,
    pub temp_anomaly_celsius: Option<f64>,
    pub total_fires: i64,
    pub avg_intensity: f64,
    pub max_intensity: f64,
}
