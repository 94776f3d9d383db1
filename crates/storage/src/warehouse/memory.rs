//! In-process warehouse with the same table semantics as Postgres.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use climate_common::{
    summarize, AnnualSummary, FireRow, PipelineError, PipelineResult, TemperatureRow,
};

use super::{dedupe_temperatures, Warehouse, WriteMode, SUMMARY_TABLE};

/// `None` means the table does not exist.
#[derive(Debug, Default)]
struct Tables {
    temperatures: Option<Vec<TemperatureRow>>,
    fires: Option<Vec<FireRow>>,
    summary: Option<Vec<AnnualSummary>>,
}

#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: RwLock<Tables>,
    failing_fire_writes: AtomicUsize,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` fire batch writes fail without touching the table.
    pub fn fail_next_fire_writes(&self, count: usize) {
        self.failing_fire_writes.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_fire_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn replace_temperatures(&self, rows: &[TemperatureRow]) -> PipelineResult<u64> {
        let rows = dedupe_temperatures(rows);
        let count = rows.len() as u64;
        self.tables.write().await.temperatures = Some(rows);
        Ok(count)
    }

    async fn write_fire_batch(&self, rows: &[FireRow], mode: WriteMode) -> PipelineResult<u64> {
        if self.take_injected_failure() {
            return Err(PipelineError::Database(
                "injected raw_fires write failure".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        match mode {
            WriteMode::Replace => tables.fires = Some(rows.to_vec()),
            WriteMode::Append => tables
                .fires
                .get_or_insert_with(Vec::new)
                .extend_from_slice(rows),
        }
        Ok(rows.len() as u64)
    }

    async fn rebuild_summary(&self) -> PipelineResult<u64> {
        let mut tables = self.tables.write().await;
        let summary = summarize(
            tables.temperatures.as_deref().unwrap_or_default(),
            tables.fires.as_deref().unwrap_or_default(),
        );
        let count = summary.len() as u64;
        tables.summary = Some(summary);
        Ok(count)
    }

    async fn read_summary(&self) -> PipelineResult<Vec<AnnualSummary>> {
        self.tables
            .read()
            .await
            .summary
            .clone()
            .ok_or_else(|| PipelineError::Database(format!("{} does not exist", SUMMARY_TABLE)))
    }

    async fn read_temperatures(&self) -> PipelineResult<Vec<TemperatureRow>> {
        self.tables
            .read()
            .await
            .temperatures
            .clone()
            .ok_or_else(|| PipelineError::Database("raw_temperatures does not exist".to_string()))
    }

    async fn read_fires(&self) -> PipelineResult<Vec<FireRow>> {
        let mut fires = self
            .tables
            .read()
            .await
            .fires
            .clone()
            .ok_or_else(|| PipelineError::Database("raw_fires does not exist".to_string()))?;
        fires.sort_by(|a, b| {
            a.fire_date
                .cmp(&b.fire_date)
                .then_with(|| a.source_file.cmp(&b.source_file))
        });
        Ok(fires)
    }
}
