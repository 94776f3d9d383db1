//! Load ledger-listed partition files into the warehouse.

use std::path::PathBuf;
use std::sync::Arc;

use metrics::counter;
use tracing::{info, instrument, warn};

use climate_common::{DatasetKind, FetchRecord, Partition, PipelineError, PipelineResult};
use storage::{paths, FetchLedger, Warehouse, WriteMode};

use crate::error::Result;
use crate::fires::parse_firms;
use crate::temperature::parse_gistemp;

/// A file that could not be loaded.
#[derive(Debug)]
pub struct FileFailure {
    pub partition: Partition,
    pub location: String,
    pub error: PipelineError,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    /// Rows in `raw_temperatures`, or `None` when no temperature partition
    /// has been fetched.
    pub temperature_rows: Option<u64>,
    pub fire_files_loaded: usize,
    pub fire_rows: u64,
    /// Fire rows dropped for unparseable dates.
    pub fire_rows_dropped: usize,
    pub failures: Vec<FileFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reads partition files through the ledger, so a file is never loaded
/// before its record exists.
pub struct Loader {
    storage_root: PathBuf,
    ledger: Arc<dyn FetchLedger>,
    warehouse: Arc<dyn Warehouse>,
}

impl Loader {
    pub fn new(
        storage_root: impl Into<PathBuf>,
        ledger: Arc<dyn FetchLedger>,
        warehouse: Arc<dyn Warehouse>,
    ) -> Self {
        Self {
            storage_root: storage_root.into(),
            ledger,
            warehouse,
        }
    }

    /// Load both datasets. Ledger errors abort; file errors are collected.
    #[instrument(skip(self))]
    pub async fn load(&self) -> PipelineResult<LoadReport> {
        let mut report = LoadReport::default();
        self.load_temperatures(&mut report).await?;
        self.load_fires(&mut report).await?;

        info!(
            temperature_rows = ?report.temperature_rows,
            fire_files = report.fire_files_loaded,
            fire_rows = report.fire_rows,
            failed = report.failures.len(),
            "Load finished"
        );
        Ok(report)
    }

    async fn read(&self, record: &FetchRecord) -> Result<Vec<u8>> {
        let path = paths::resolve(&self.storage_root, &record.location);
        Ok(tokio::fs::read(&path).await?)
    }

    /// Replace `raw_temperatures` from the most recent temperature snapshot.
    pub async fn load_temperatures(&self, report: &mut LoadReport) -> PipelineResult<()> {
        let Some(record) = self.ledger.latest(DatasetKind::Temperature).await? else {
            warn!("No temperature partition fetched yet, skipping");
            return Ok(());
        };

        let result: PipelineResult<u64> = async {
            let data = self.read(&record).await?;
            let rows = parse_gistemp(&data)?;
            self.warehouse.replace_temperatures(&rows).await
        }
        .await;

        match result {
            Ok(rows) => {
                counter!("raw_rows_loaded_total", "table" => "raw_temperatures").increment(rows);
                info!(location = %record.location, rows, "Loaded temperatures");
                report.temperature_rows = Some(rows);
            }
            Err(e) => {
                warn!(location = %record.location, error = %e, "Temperature load failed");
                report.failures.push(FileFailure {
                    partition: record.partition,
                    location: record.location,
                    error: e,
                });
            }
        }
        Ok(())
    }

    /// Rebuild `raw_fires` from every fire partition, ascending by year.
    ///
    /// The first successful write replaces the table and later ones append.
    /// A file that fails does not count as the first write.
    pub async fn load_fires(&self, report: &mut LoadReport) -> PipelineResult<()> {
        let records = self.ledger.list(DatasetKind::Fire).await?;
        if records.is_empty() {
            warn!("No fire partitions fetched yet, skipping");
            return Ok(());
        }

        let mut initialized = false;
        for record in records {
            let mode = WriteMode::for_batch(!initialized);
            let result: PipelineResult<(u64, usize)> = async {
                let data = self.read(&record).await?;
                let batch = parse_firms(&data, &record.location)?;
                let written = self.warehouse.write_fire_batch(&batch.rows, mode).await?;
                Ok::<_, PipelineError>((written, batch.dropped))
            }
            .await;

            match result {
                Ok((rows, dropped)) => {
                    initialized = true;
                    report.fire_files_loaded += 1;
                    report.fire_rows += rows;
                    report.fire_rows_dropped += dropped;
                    counter!("raw_rows_loaded_total", "table" => "raw_fires").increment(rows);
                    info!(location = %record.location, rows, mode = ?mode, "Loaded fire file");
                }
                Err(e) => {
                    warn!(location = %record.location, error = %e, "Fire file failed, continuing");
                    report.failures.push(FileFailure {
                        partition: record.partition,
                        location: record.location,
                        error: e,
                    });
                }
            }
        }
        Ok(())
    }
}
